use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use event_listener::Event;
use tracing::trace;

const DEFAULT_EVENT_ORDERING: Ordering = Ordering::SeqCst;

/// A one-shot event that stays set once notified.
///
/// Used as the cooperative stop token for consumer loops: every suspension
/// point listens on it and returns promptly after `notify`. Listening after
/// the flag is set resolves immediately, so late listeners never hang.
#[derive(Debug)]
pub struct StickyEvent {
    flag: AtomicBool,
    event: Event,
}

impl StickyEvent {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            flag: AtomicBool::new(false),
            event: Event::new(),
        })
    }

    // is flag set
    pub fn is_set(&self) -> bool {
        self.flag.load(DEFAULT_EVENT_ORDERING)
    }

    pub async fn listen(&self) {
        if self.is_set() {
            trace!("before, flag is set");
            return;
        }

        let listener = self.event.listen();

        if self.is_set() {
            trace!("after, flag is set");
            return;
        }

        listener.await
    }

    pub fn notify(&self) {
        self.flag.store(true, DEFAULT_EVENT_ORDERING);
        self.event.notify(usize::MAX);
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::StickyEvent;

    #[tokio::test]
    async fn test_listen_resolves_after_notify() {
        let event = StickyEvent::shared();
        assert!(!event.is_set());

        let waiter = event.clone();
        let task = tokio::spawn(async move { waiter.listen().await });

        event.notify();
        assert!(event.is_set());

        timeout(Duration::from_secs(1), task)
            .await
            .expect("listener should wake after notify")
            .expect("listener task should not panic");
    }

    #[tokio::test]
    async fn test_listen_after_notify_is_immediate() {
        let event = StickyEvent::shared();
        event.notify();

        // late listener must not block
        timeout(Duration::from_millis(10), event.listen())
            .await
            .expect("listen on a set event should resolve immediately");
    }

    #[tokio::test]
    async fn test_notify_is_sticky() {
        let event = StickyEvent::shared();
        event.notify();
        event.notify();
        assert!(event.is_set());
    }
}
