//! Change-notification feed: insert/update events delivered over a
//! per-subscription channel. Delivery is message-passing into whatever
//! single-threaded loop drains the subscription, never a callback invoked
//! on a store thread.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use campuschat_core::{Message, MessageId, SubscriptionId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A row was appended. Carries the full message inline, sender name
    /// already resolved.
    Inserted(Message),
    /// A read flag flipped false -> true. `sender_id` identifies the
    /// conversation bucket the message belongs to.
    ReadMarked {
        message_id: MessageId,
        sender_id: UserId,
    },
    /// The feed is gone. No resume offset exists; re-subscribe and
    /// re-hydrate.
    Disconnected,
}

/// Consumer end of a change feed.
pub struct Subscription {
    id: SubscriptionId,
    rx: Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Non-blocking read of the next pending event. Returns `None` when
    /// the feed is currently empty. A dropped publisher side surfaces as
    /// a final `Disconnected`.
    pub fn try_next(&self) -> Option<ChangeEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(ChangeEvent::Disconnected),
        }
    }
}

/// Publisher side held by the store: fan-out to every live subscription.
pub struct ChangeFeed {
    subscribers: Vec<(SubscriptionId, Sender<ChangeEvent>)>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let id = SubscriptionId::new();
        self.subscribers.push((id, tx));
        Subscription { id, rx }
    }

    /// Broadcast an event, pruning subscribers whose receiver is gone.
    pub fn publish(&mut self, event: &ChangeEvent) {
        self.subscribers
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    /// Push `Disconnected` into every live feed and drop the senders,
    /// simulating the upstream stream going away.
    pub fn disconnect_all(&mut self) {
        for (id, tx) in self.subscribers.drain(..) {
            if tx.send(ChangeEvent::Disconnected).is_err() {
                tracing::debug!(subscription = %id, "subscriber already gone at disconnect");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campuschat_core::Timestamp;

    fn sample_message() -> Message {
        Message {
            id: MessageId::new(),
            sender_id: UserId::new(),
            recipient_id: None,
            body: "ping".into(),
            created_at: Timestamp::from_millis(1),
            read: false,
            sender_name: "Someone".into(),
        }
    }

    #[test]
    fn publish_reaches_all_subscribers() {
        let mut feed = ChangeFeed::new();
        let a = feed.subscribe();
        let b = feed.subscribe();

        let event = ChangeEvent::Inserted(sample_message());
        feed.publish(&event);

        assert_eq!(a.try_next(), Some(event.clone()));
        assert_eq!(b.try_next(), Some(event));
        assert_eq!(a.try_next(), None);
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let mut feed = ChangeFeed::new();
        let a = feed.subscribe();
        drop(feed.subscribe());

        feed.publish(&ChangeEvent::Inserted(sample_message()));
        assert_eq!(feed.subscriber_count(), 1);
        assert!(matches!(a.try_next(), Some(ChangeEvent::Inserted(_))));
    }

    #[test]
    fn disconnect_all_delivers_final_event() {
        let mut feed = ChangeFeed::new();
        let a = feed.subscribe();

        feed.disconnect_all();
        assert_eq!(a.try_next(), Some(ChangeEvent::Disconnected));
        assert_eq!(feed.subscriber_count(), 0);
    }
}
