use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, UserId};
use crate::timestamp::Timestamp;

/// Display name used when the profile join finds no row for a sender.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// A chat message as persisted by the store.
///
/// The store owns persisted messages; timelines and conversation indexes
/// hold cached copies that are reconciled against the change feed, never
/// treated as the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    /// Present only on elevated-role replies directed at a specific
    /// counterpart; inbound messages from standard-role senders carry none.
    pub recipient_id: Option<UserId>,
    pub body: String,
    pub created_at: Timestamp,
    /// Monotonic false -> true, flipped only by the elevated viewer.
    pub read: bool,
    /// Denormalized from the sender's profile at query time.
    pub sender_name: String,
}

impl Message {
    /// Sort key giving the total timeline order: timestamp ascending,
    /// ties broken by id.
    pub fn sort_key(&self) -> (Timestamp, MessageId) {
        (self.created_at, self.id)
    }
}
