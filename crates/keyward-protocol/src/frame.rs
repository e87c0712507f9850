use crate::event::{Event, EventKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("invalid event data: {0}")]
    Data(#[from] serde_json::Error),
}

/// Incremental decoder for the daemon's server-sent-event stream.
///
/// Feed it one line at a time (without the trailing newline). A blank line
/// closes the pending frame; `push_line` then returns the decoded event.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    kind: Option<String>,
    data: Option<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) -> Result<Option<Event>, FrameError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.kind = Some(value.to_string()),
            "data" => match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            // id, retry and unknown fields carry nothing we use
            _ => {}
        }
        Ok(None)
    }

    fn dispatch(&mut self) -> Result<Option<Event>, FrameError> {
        let kind = self.kind.take();
        let Some(data) = self.data.take() else {
            return Ok(None);
        };
        let mut event: Event = serde_json::from_str(&data)?;
        event.kind = EventKind::from(kind.as_deref().unwrap_or_default());
        Ok(Some(event))
    }
}
