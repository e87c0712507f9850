use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Correlation ID
// ---------------------------------------------------------------------------

/// Opaque identifier tying one client request to every progress event it
/// produces. Minted once per request by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Mint a fresh random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Event kind
// ---------------------------------------------------------------------------

/// The SSE `event:` designator of a frame.
///
/// `Message` is what a frame without an `event:` line decodes to. Names the
/// daemon does not know are carried through as `Other`. A name holding a line
/// break cannot be framed; see [`EventKind::is_framable`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    #[default]
    Message,
    Progress,
    Error,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Message => "message",
            EventKind::Progress => "progress",
            EventKind::Error => "error",
            EventKind::Other(name) => name,
        }
    }

    /// Whether the name fits on a single `event:` line.
    pub fn is_framable(&self) -> bool {
        !self.as_str().contains(['\r', '\n'])
    }
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        match value {
            "" | "message" => EventKind::Message,
            "progress" => EventKind::Progress,
            "error" => EventKind::Error,
            other => EventKind::Other(other.replace(['\r', '\n'], "_")),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One progress signal, snapshotting the tree-wide counters at emission time.
///
/// The kind travels on the frame's `event:` line, so it is not part of the
/// JSON `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: CorrelationId,
    pub message: String,
    #[serde(skip)]
    pub kind: EventKind,
    pub completed: u64,
    pub total: u64,
}

impl Event {
    /// JSON body of the frame's `data:` line.
    pub fn data_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
