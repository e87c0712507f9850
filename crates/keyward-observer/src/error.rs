use crate::hub::HubState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("invalid context: no request id bound")]
    InvalidContext,

    #[error("hub cannot be started from the {0} state")]
    HubNotIdle(HubState),

    #[error("hub is stopped")]
    HubStopped,
}
