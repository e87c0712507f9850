pub mod api;
pub mod event;
pub mod frame;

pub use event::{CorrelationId, Event, EventKind};
pub use frame::{FrameDecoder, FrameError};

/// Header carrying the per-request correlation ID from client to daemon.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Content type announced by the progress stream endpoint.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Long-lived server-sent-event stream of progress events.
pub const OBSERVE_PATH: &str = "/v1/observe";

pub const VERSION_PATH: &str = "/v1/version";

pub const KEYPAIRS_GENERATE_PATH: &str = "/v1/keypairs/generate";

/// Maximum size of a single line on the event stream (64 KiB).
pub const MAX_FRAME_LINE_BYTES: usize = 64 * 1024;
