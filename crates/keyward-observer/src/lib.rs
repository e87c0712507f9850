//! Progress reporting core of the keyward daemon.
//!
//! Long-running operations build a tree of [`Notifier`]s against a single
//! request, each node reserving a slice of the request's work budget. Every
//! `notify` call snapshots the tree-wide counters into an [`Event`] and offers
//! it to the process-wide [`Hub`], which fans events out to every open
//! `/v1/observe` stream ([`endpoint::observe`]). Clients pick their own events
//! out of that shared stream by correlation ID.
//!
//! [`Event`]: keyward_protocol::Event

pub mod context;
pub mod endpoint;
pub mod error;
pub mod hub;
pub mod notifier;

pub use context::RequestContext;
pub use error::ObserverError;
pub use hub::{Hub, HubConfig, HubState, SubscriberId, Subscription};
pub use notifier::Notifier;
