use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use keyward_protocol::Event;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::RequestContext;
use crate::error::ObserverError;

pub type SubscriberId = u64;

/// Buffer sizes of the hub. Both buffers drop the newest event when full.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Events accepted from notifiers but not yet drained.
    pub inbound_capacity: usize,
    /// Events queued for one stream subscriber but not yet written.
    pub subscriber_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: 256,
            subscriber_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for HubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubState::Idle => write!(f, "idle"),
            HubState::Running => write!(f, "running"),
            HubState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Process-wide progress broadcaster.
///
/// Notifiers offer events into a bounded inbound queue; a single drain task
/// moves them, in acceptance order, into a bounded queue per attached
/// subscriber. Nothing on the producer side ever waits on a consumer.
///
/// Cloning is cheap: clones share the same hub.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<Inner>,
}

struct Inner {
    config: HubConfig,
    inbound: mpsc::Sender<Event>,
    /// Taken by the drain task on start.
    receiver: Mutex<Option<mpsc::Receiver<Event>>>,
    state: Mutex<HubState>,
    shutdown: CancellationToken,
    subscribers: DashMap<SubscriberId, mpsc::Sender<Event>>,
    next_subscriber: AtomicU64,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        let (inbound, receiver) = mpsc::channel(config.inbound_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                inbound,
                receiver: Mutex::new(Some(receiver)),
                state: Mutex::new(HubState::Idle),
                shutdown: CancellationToken::new(),
                subscribers: DashMap::new(),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    pub fn state(&self) -> HubState {
        *lock(&self.inner.state)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Spawn the drain loop on the current tokio runtime.
    pub fn start(&self) -> Result<JoinHandle<()>, ObserverError> {
        let mut state = lock(&self.inner.state);
        if *state != HubState::Idle {
            return Err(ObserverError::HubNotIdle(*state));
        }
        let Some(receiver) = lock(&self.inner.receiver).take() else {
            return Err(ObserverError::HubNotIdle(*state));
        };
        *state = HubState::Running;
        drop(state);

        info!(
            inbound_capacity = self.inner.config.inbound_capacity,
            subscriber_capacity = self.inner.config.subscriber_capacity,
            "progress hub started"
        );
        let hub = self.clone();
        Ok(tokio::spawn(async move { hub.drain(receiver).await }))
    }

    /// Stop delivering. Idempotent.
    ///
    /// Pending and future events are dropped, the drain loop exits and every
    /// subscriber is detached, which ends its stream.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.inner.state);
            if *state == HubState::Stopped {
                return;
            }
            *state = HubState::Stopped;
        }
        self.inner.shutdown.cancel();
        self.inner.subscribers.clear();
        info!("progress hub stopped");
    }

    /// Register a new stream subscriber.
    pub fn attach(&self) -> Result<Subscription, ObserverError> {
        if self.is_stopped() {
            return Err(ObserverError::HubStopped);
        }
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.config.subscriber_capacity.max(1));
        self.inner.subscribers.insert(id, tx);

        // stop() cancels before clearing, so a racing stop is caught here
        if self.is_stopped() {
            self.inner.subscribers.remove(&id);
            return Err(ObserverError::HubStopped);
        }

        debug!(subscriber = id, "stream subscriber attached");
        Ok(Subscription {
            id,
            rx,
            hub: self.clone(),
        })
    }

    pub fn detach(&self, id: SubscriberId) {
        if self.inner.subscribers.remove(&id).is_some() {
            debug!(subscriber = id, "stream subscriber detached");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Offer an event without ever blocking: a cancelled request, a stopped
    /// hub or a full inbound queue all drop it.
    pub(crate) fn offer(&self, ctx: &RequestContext, event: Event) {
        if ctx.is_cancelled() {
            debug!(request_id = %event.id, "request cancelled, dropping progress event");
            return;
        }
        if self.is_stopped() {
            return;
        }
        match self.inner.inbound.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(request_id = %event.id, "hub inbound queue full, dropping progress event");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    async fn drain(self, mut receiver: mpsc::Receiver<Event>) {
        loop {
            tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break,
                event = receiver.recv() => match event {
                    Some(event) => self.broadcast(event),
                    None => break,
                },
            }
        }
        debug!("progress hub drain loop exited");
    }

    fn broadcast(&self, event: Event) {
        // Snapshot so the subscriber map is never held while delivering.
        let targets: Vec<(SubscriberId, mpsc::Sender<Event>)> = self
            .inner
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(
                        subscriber = id,
                        request_id = %event.id,
                        "subscriber lagging, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => self.detach(id),
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn take_inbound(&self) -> mpsc::Receiver<Event> {
        lock(&self.inner.receiver)
            .take()
            .expect("inbound receiver already taken")
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("state", &self.state())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// One attached stream consumer. Dropping it detaches it from the hub.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Event>,
    hub: Hub,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next delivered event, or `None` once the hub has stopped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.detach(self.id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
