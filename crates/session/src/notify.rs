//! Session change notification.
//!
//! Cross-context signaling with at-least-once, unordered, best-effort
//! delivery. On the web this contract is carried by `storage` events and
//! `postMessage`; in-process it is a broadcast channel. Consumers must
//! tolerate duplicates, reordering, and their own echoes — every change
//! carries the origin id of the context that published it, so a context can
//! ignore events it raised itself.

use tokio::sync::broadcast;
use uuid::Uuid;

use vikareta_core::UserId;

/// Capacity of the in-process broadcast channel. Slow subscribers lose the
/// oldest events, which the best-effort contract permits.
const CHANNEL_CAPACITY: usize = 64;

/// What changed about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChangeEvent {
    /// A principal logged in.
    LoggedIn { user_id: UserId },
    /// The principal logged out.
    LoggedOut,
    /// The session was torn down by the idle watchdog.
    TimedOut,
}

/// A change event tagged with the publishing context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
    /// Id of the context that published the event.
    pub origin: Uuid,
    pub event: SessionChangeEvent,
}

/// Publish/subscribe seam for session changes.
pub trait SessionChangeNotifier: Send + Sync {
    /// Publish a change. Best-effort: absence of subscribers is not an
    /// error.
    fn publish(&self, change: SessionChange);

    /// Subscribe to future changes, including this context's own.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;
}

/// In-process notifier backed by a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<SessionChange>,
}

impl BroadcastNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionChangeNotifier for BroadcastNotifier {
    fn publish(&self, change: SessionChange) {
        // A send error only means there are no subscribers right now.
        let _ = self.sender.send(change);
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_changes() {
        let notifier = BroadcastNotifier::new();
        let mut rx = notifier.subscribe();

        let origin = Uuid::new_v4();
        notifier.publish(SessionChange {
            origin,
            event: SessionChangeEvent::LoggedOut,
        });

        let change = rx.recv().await.unwrap();
        assert_eq!(change.origin, origin);
        assert_eq!(change.event, SessionChangeEvent::LoggedOut);
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let notifier = BroadcastNotifier::new();
        notifier.publish(SessionChange {
            origin: Uuid::new_v4(),
            event: SessionChangeEvent::TimedOut,
        });
    }

    #[tokio::test]
    async fn test_origin_lets_contexts_ignore_own_events() {
        let notifier = BroadcastNotifier::new();
        let mut rx = notifier.subscribe();

        let me = Uuid::new_v4();
        let someone_else = Uuid::new_v4();
        notifier.publish(SessionChange {
            origin: me,
            event: SessionChangeEvent::LoggedOut,
        });
        notifier.publish(SessionChange {
            origin: someone_else,
            event: SessionChangeEvent::LoggedOut,
        });

        let mut foreign = Vec::new();
        while let Ok(change) = rx.try_recv() {
            if change.origin != me {
                foreign.push(change);
            }
        }
        assert_eq!(foreign.len(), 1);
    }
}
