use std::io;
use std::pin::Pin;

use futures_util::{Stream, StreamExt, TryStreamExt};
use keyward_protocol::{CorrelationId, Event, FrameDecoder, MAX_FRAME_LINE_BYTES};
use tokio_util::bytes::Bytes;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::error::ClientError;

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Decoded view of the daemon's shared progress stream.
///
/// Yields every event on the stream, whichever request produced it.
pub struct EventStream {
    lines: FramedRead<StreamReader<ByteStream, Bytes>, LinesCodec>,
    decoder: FrameDecoder,
}

impl EventStream {
    pub(crate) fn new(response: reqwest::Response) -> Self {
        let bytes: ByteStream = Box::pin(response.bytes_stream().map_err(io::Error::other));
        Self {
            lines: FramedRead::new(
                StreamReader::new(bytes),
                LinesCodec::new_with_max_length(MAX_FRAME_LINE_BYTES),
            ),
            decoder: FrameDecoder::new(),
        }
    }

    /// Read the next event. Returns `None` once the daemon closes the stream.
    pub async fn next(&mut self) -> Option<Result<Event, ClientError>> {
        loop {
            let line = match self.lines.next().await? {
                Ok(line) => line,
                Err(err) => {
                    return Some(Err(ClientError::Stream {
                        message: err.to_string(),
                    }));
                }
            };
            match self.decoder.push_line(&line) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

/// Forward events tagged `id` to `on_progress` until the stream ends.
///
/// The first stream failure is forwarded and ends the loop.
pub(crate) async fn forward_progress<F>(
    mut events: EventStream,
    id: CorrelationId,
    mut on_progress: F,
)
where
    F: FnMut(Result<Event, ClientError>),
{
    while let Some(next) = events.next().await {
        match next {
            Ok(event) if event.id == id => on_progress(Ok(event)),
            Ok(_) => {}
            Err(err) => {
                debug!(request_id = %id, "progress stream failed: {err}");
                on_progress(Err(err));
                return;
            }
        }
    }
}
