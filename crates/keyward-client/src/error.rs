use keyward_protocol::FrameError;
use thiserror::Error;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to daemon at {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("daemon returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("invalid daemon response: {0}")]
    Response(#[source] reqwest::Error),
    #[error("progress decode error: {0}")]
    Decode(#[from] FrameError),
    #[error("progress stream error: {message}")]
    Stream { message: String },
}
