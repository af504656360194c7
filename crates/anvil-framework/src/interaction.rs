//! Awaiting follow-up messages.
//!
//! A command that asks the user a question registers a listener and waits
//! for the next message that matches it. Inbound messages are offered to
//! listeners before command parsing; a delivered message is consumed.
//!
//! The listener is removed on every exit path (delivery, timeout, or the
//! waiting future being dropped).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anvil_core::InboundMessage;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

type Filter = Box<dyn Fn(&InboundMessage) -> bool + Send + Sync>;

struct Listener {
    id: u64,
    filter: Filter,
    tx: oneshot::Sender<Arc<InboundMessage>>,
}

/// Pending response listeners.
#[derive(Default)]
pub struct Interactions {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
}

struct ListenerGuard<'a> {
    interactions: &'a Interactions,
    id: u64,
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        self.interactions
            .listeners
            .lock()
            .retain(|listener| listener.id != self.id);
    }
}

impl Interactions {
    /// Creates an empty listener table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the first offered message accepted by `filter`.
    ///
    /// Returns `None` when `timeout` elapses first.
    pub async fn await_response<F>(&self, filter: F, timeout: Duration) -> Option<Arc<InboundMessage>>
    where
        F: Fn(&InboundMessage) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push(Listener {
            id,
            filter: Box::new(filter),
            tx,
        });
        let _guard = ListenerGuard {
            interactions: self,
            id,
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(message)) => Some(message),
            Ok(Err(_)) => None,
            Err(_) => {
                trace!(listener = id, "Response wait timed out");
                None
            }
        }
    }

    /// Offers a message to the pending listeners.
    ///
    /// Returns `true` if a listener consumed it.
    pub fn offer(&self, message: &Arc<InboundMessage>) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(pos) = listeners
            .iter()
            .position(|l| !l.tx.is_closed() && (l.filter)(message))
        else {
            return false;
        };
        let listener = listeners.remove(pos);
        listener.tx.send(message.clone()).is_ok()
    }

    /// Number of live listeners.
    pub fn pending(&self) -> usize {
        self.listeners.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_core::User;
    use tokio_test::{assert_pending, task};

    fn from(author: &str, content: &str) -> Arc<InboundMessage> {
        Arc::new(InboundMessage::direct(content, User::new(author, author), "d1"))
    }

    #[tokio::test]
    async fn test_delivery_removes_listener() {
        let interactions = Arc::new(Interactions::new());
        let waiter = {
            let interactions = interactions.clone();
            tokio::spawn(async move {
                interactions
                    .await_response(|m| m.author.id.as_str() == "alice", Duration::from_secs(5))
                    .await
            })
        };

        while interactions.pending() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!interactions.offer(&from("bob", "no")));
        assert!(interactions.offer(&from("alice", "yes")));

        let reply = waiter.await.unwrap().unwrap();
        assert_eq!(reply.content, "yes");
        assert_eq!(interactions.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_listener() {
        let interactions = Interactions::new();
        let reply = interactions
            .await_response(|_| true, Duration::from_secs(30))
            .await;
        assert!(reply.is_none());
        assert_eq!(interactions.pending(), 0);
        assert!(!interactions.offer(&from("alice", "late")));
    }

    #[tokio::test]
    async fn test_dropped_wait_removes_listener() {
        let interactions = Interactions::new();
        {
            let mut wait = task::spawn(interactions.await_response(|_| true, Duration::from_secs(30)));
            assert_pending!(wait.poll());
            assert_eq!(interactions.pending(), 1);
        }
        assert_eq!(interactions.pending(), 0);
    }
}
