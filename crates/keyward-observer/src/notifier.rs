use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use keyward_protocol::{CorrelationId, Event, EventKind};

use crate::context::RequestContext;
use crate::error::ObserverError;
use crate::hub::Hub;

/// Tree-wide budget shared by every node of one progress tree.
#[derive(Debug)]
struct Counters {
    total: u64,
    completed: u64,
}

/// One node of a progress tree: a reserved slice of a request's work budget.
///
/// All nodes of a tree share one set of counters behind one lock, so
/// concurrent `notify` calls from siblings and cousins are linearized.
/// Dropping the nodes is the only teardown there is.
pub struct Notifier {
    id: CorrelationId,
    reserved: u64,
    ctx: RequestContext,
    counters: Arc<Mutex<Counters>>,
    hub: Hub,
}

impl Hub {
    /// Create the root of a progress tree for the request bound in `ctx`.
    ///
    /// Fails with [`ObserverError::InvalidContext`] when no request ID is bound.
    pub fn notifier(&self, ctx: &RequestContext, total: u64) -> Result<Notifier, ObserverError> {
        let id = ctx
            .request_id()
            .cloned()
            .ok_or(ObserverError::InvalidContext)?;
        Ok(Notifier {
            id,
            reserved: total,
            ctx: ctx.clone(),
            counters: Arc::new(Mutex::new(Counters {
                total,
                completed: 0,
            })),
            hub: self.clone(),
        })
    }
}

impl Notifier {
    /// Reserve `total` more units for a sub-step and return its node.
    pub fn child(&self, total: u64) -> Notifier {
        self.counters().total += total;
        Notifier {
            id: self.id.clone(),
            reserved: total,
            ctx: self.ctx.clone(),
            counters: Arc::clone(&self.counters),
            hub: self.hub.clone(),
        }
    }

    /// Report progress, counting one completed unit when `completed` is set.
    ///
    /// Never blocks and never fails: if the request is cancelled, the hub is
    /// stopped or the hub is saturated, the event is dropped.
    ///
    /// # Panics
    ///
    /// Panics when the completion would exceed the tree's reserved total.
    /// That means a caller reserved the wrong budget.
    pub fn notify(&self, kind: EventKind, message: impl Into<String>, completed: bool) {
        let mut counters = self.counters();
        if completed {
            if counters.completed >= counters.total {
                panic!(
                    "progress budget exceeded for request {}: {} units already completed of {} reserved",
                    self.id, counters.completed, counters.total
                );
            }
            counters.completed += 1;
        }
        let event = Event {
            id: self.id.clone(),
            message: message.into(),
            kind,
            completed: counters.completed,
            total: counters.total,
        };
        // Offered under the tree lock so this tree's events reach the hub in
        // counter order. The offer itself never waits.
        self.hub.offer(&self.ctx, event);
    }

    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Units this node reserved when it was created.
    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    /// Tree-wide completed units.
    pub fn completed(&self) -> u64 {
        self.counters().completed
    }

    /// Tree-wide reserved units.
    pub fn total(&self) -> u64 {
        self.counters().total
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{HubConfig, HubState};
    use std::thread;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio_util::sync::CancellationToken;

    fn context() -> RequestContext {
        RequestContext::new().with_request_id(CorrelationId::new())
    }

    #[test]
    fn chained_notifiers_track_total_and_completed() {
        let hub = Hub::new(HubConfig::default());
        let mut inbound = hub.take_inbound();
        let ctx = context();

        let parent = hub.notifier(&ctx, 5).unwrap();
        let child = parent.child(6);
        let (grandchild_a, grandchild_b) = thread::scope(|s| {
            let a = s.spawn(|| child.child(7));
            let b = s.spawn(|| child.child(6));
            (a.join().unwrap(), b.join().unwrap())
        });
        assert_eq!(parent.total(), 24);
        assert_eq!(grandchild_a.reserved(), 7);

        thread::scope(|s| {
            s.spawn(|| grandchild_b.notify(EventKind::Progress, "hello", true));
            s.spawn(|| grandchild_a.notify(EventKind::Progress, "woo", true));
            s.spawn(|| grandchild_a.notify(EventKind::Progress, "hahahaha", false));
        });

        let first = inbound.try_recv().unwrap();
        let second = inbound.try_recv().unwrap();
        let third = inbound.try_recv().unwrap();
        assert!(first.completed <= second.completed && second.completed <= third.completed);
        assert_eq!(third.total, 24);
        assert_eq!(third.completed, 2);
        assert!([first, second, third].iter().all(|e| &e.id == parent.id()));
    }

    #[test]
    fn budget_may_grow_after_completions() {
        let hub = Hub::new(HubConfig::default());
        let mut inbound = hub.take_inbound();

        let root = hub.notifier(&context(), 1).unwrap();
        root.notify(EventKind::Progress, "first", true);
        let child = root.child(2);
        child.notify(EventKind::Progress, "second", true);

        assert_eq!(inbound.try_recv().unwrap().total, 1);
        let event = inbound.try_recv().unwrap();
        assert_eq!((event.completed, event.total), (2, 3));
    }

    #[test]
    fn cancelled_context_drops_event() {
        let hub = Hub::new(HubConfig::default());
        let mut inbound = hub.take_inbound();
        let cancel = CancellationToken::new();
        let ctx = context().with_cancellation(cancel.clone());

        let parent = hub.notifier(&ctx, 1).unwrap();
        let child = parent.child(3);
        cancel.cancel();
        child.notify(EventKind::Progress, "hahahaha", true);

        assert!(matches!(inbound.try_recv(), Err(TryRecvError::Empty)));
        // the completion still counts
        assert_eq!(parent.completed(), 1);
    }

    #[test]
    fn stopped_hub_drops_event() {
        let hub = Hub::new(HubConfig::default());
        let mut inbound = hub.take_inbound();

        let parent = hub.notifier(&context(), 1).unwrap();
        let child = parent.child(1);
        hub.stop();
        child.notify(EventKind::Progress, "hello please dont timeout", true);

        assert!(matches!(inbound.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn saturated_hub_drops_newest() {
        let hub = Hub::new(HubConfig {
            inbound_capacity: 1,
            subscriber_capacity: 1,
        });
        let mut inbound = hub.take_inbound();

        let root = hub.notifier(&context(), 2).unwrap();
        root.notify(EventKind::Progress, "kept", true);
        root.notify(EventKind::Progress, "dropped", true);

        assert_eq!(inbound.try_recv().unwrap().message, "kept");
        assert!(matches!(inbound.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(root.completed(), 2);
    }

    #[test]
    #[should_panic(expected = "progress budget exceeded")]
    fn exceeding_total_panics() {
        let hub = Hub::new(HubConfig::default());
        let _inbound = hub.take_inbound();

        let parent = hub.notifier(&context(), 1).unwrap();
        parent.notify(EventKind::Progress, "helo", true);
        parent.notify(EventKind::Progress, "haha", true);
    }

    #[test]
    fn root_requires_request_id() {
        let hub = Hub::new(HubConfig::default());
        assert!(matches!(
            hub.notifier(&RequestContext::new(), 1),
            Err(ObserverError::InvalidContext)
        ));
    }

    #[tokio::test]
    async fn notify_without_listeners_returns() {
        let hub = Hub::new(HubConfig::default());
        hub.start().unwrap();

        let n = hub.notifier(&context(), 1).unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            n.notify(EventKind::Progress, "hi", true);
        })
        .await
        .expect("notify blocked with no listener attached");
        assert_eq!(hub.state(), HubState::Running);
        hub.stop();
    }

    #[tokio::test]
    async fn notify_from_blocking_threads() {
        let hub = Hub::new(HubConfig::default());
        hub.start().unwrap();
        let mut sub = hub.attach().unwrap();

        let root = Arc::new(hub.notifier(&context(), 4).unwrap());
        let mut workers = Vec::new();
        for _ in 0..4 {
            let root = Arc::clone(&root);
            workers.push(tokio::task::spawn_blocking(move || {
                root.child(0).notify(EventKind::Progress, "unit", true);
            }));
        }
        for worker in workers {
            worker.await.unwrap();
        }

        let mut last = 0;
        for _ in 0..4 {
            let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(event.completed > last);
            last = event.completed;
        }
        assert_eq!(last, 4);
        hub.stop();
    }
}
