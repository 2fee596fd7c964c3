use campuschat_core::{Message, MessageId, UserId};

use crate::changes::Subscription;
use crate::error::StoreError;

/// Participant filter for bulk reads. Results are always ordered by
/// `(created_at, message_id)` ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFilter {
    /// A standard viewer's single conversation: messages they sent plus
    /// messages addressed to them.
    Standard { viewer: UserId },
    /// The elevated viewer's timeline for one selected counterpart:
    /// messages sent by either side of that conversation.
    Elevated {
        viewer: UserId,
        counterpart: UserId,
    },
    /// Every message not authored by the viewer. Input for rebuilding the
    /// elevated viewer's conversation index.
    InboundTo { viewer: UserId },
}

/// The durable message store the chat core runs against.
///
/// Append-only messages keyed by id, queryable by participant filters, with
/// a single row-level mutation (the read flag) and an insert/update change
/// feed. The engine never treats its own cached copies as authoritative.
pub trait MessageStore {
    /// Ordered bulk read, `(created_at, message_id)` ascending.
    fn query_messages(&self, filter: MessageFilter) -> Result<Vec<Message>, StoreError>;

    /// Persist a new message. The store assigns id and timestamp and
    /// returns the authoritative copy, sender name resolved.
    fn insert_message(
        &mut self,
        sender_id: UserId,
        body: &str,
        recipient_id: Option<UserId>,
    ) -> Result<Message, StoreError>;

    /// Flip the read flag to true. Returns whether the flag actually
    /// changed; marking an already-read message is a no-op and publishes
    /// no change event.
    fn mark_read(&mut self, message_id: MessageId) -> Result<bool, StoreError>;

    fn resolve_profile_name(&self, user_id: UserId) -> Result<Option<String>, StoreError>;

    fn upsert_profile(&mut self, user_id: UserId, full_name: &str) -> Result<(), StoreError>;

    /// Open a change-notification feed. The feed has no resume offset:
    /// after a disconnect the only correct recovery is a full re-hydrate.
    fn subscribe(&mut self) -> Result<Subscription, StoreError>;
}
