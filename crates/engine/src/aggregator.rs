//! The elevated viewer's "one row per counterpart" conversation index:
//! last message preview plus a running unread count per counterpart.

use std::collections::{BTreeSet, HashMap};

use campuschat_core::{Message, MessageId, Timestamp, UserId, visibility};

#[derive(Debug, Clone)]
pub struct Conversation {
    pub counterpart: UserId,
    pub counterpart_name: String,
    pub last_body: String,
    pub last_at: Timestamp,
    last_id: MessageId,
    /// Unread accounting is a set of message ids rather than a counter:
    /// duplicate events and unknown ids cannot drive it negative.
    unread: BTreeSet<MessageId>,
}

impl Conversation {
    fn from_message(message: &Message) -> Self {
        let mut conversation = Self {
            counterpart: message.sender_id,
            counterpart_name: message.sender_name.clone(),
            last_body: message.body.clone(),
            last_at: message.created_at,
            last_id: message.id,
            unread: BTreeSet::new(),
        };
        if !message.read {
            conversation.unread.insert(message.id);
        }
        conversation
    }

    fn absorb(&mut self, message: &Message) -> bool {
        let mut changed = false;
        // Name refresh is unconditional: a bucket created from a row whose
        // profile join missed (the "Unknown" fallback) picks up the
        // resolved name from any later event, preview-ranked or not.
        if self.counterpart_name != message.sender_name {
            self.counterpart_name = message.sender_name.clone();
            changed = true;
        }
        if message.sort_key() > (self.last_at, self.last_id) {
            self.last_body = message.body.clone();
            self.last_at = message.created_at;
            self.last_id = message.id;
            changed = true;
        }
        if !message.read {
            changed |= self.unread.insert(message.id);
        }
        changed
    }

    pub fn unread_count(&self) -> usize {
        self.unread.len()
    }
}

pub struct ConversationIndex {
    conversations: HashMap<UserId, Conversation>,
}

impl ConversationIndex {
    pub fn new() -> Self {
        Self {
            conversations: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn get(&self, counterpart: UserId) -> Option<&Conversation> {
        self.conversations.get(&counterpart)
    }

    pub fn reset(&mut self) {
        self.conversations.clear();
    }

    /// Rebuild from scratch. Deterministic: the preview is the
    /// `(created_at, id)`-maximal message per bucket whatever order the
    /// input arrives in, and own sends never form a bucket.
    pub fn rebuild(&mut self, messages: &[Message], viewer: UserId) {
        self.conversations.clear();
        for message in messages {
            self.apply_insert(message, viewer);
        }
    }

    /// Fold one inserted message into the index. Viewer-authored messages
    /// are a no-op. Returns whether anything changed.
    pub fn apply_insert(&mut self, message: &Message, viewer: UserId) -> bool {
        let Some(counterpart) = visibility::bucket_for(message, viewer) else {
            return false;
        };
        match self.conversations.get_mut(&counterpart) {
            Some(conversation) => conversation.absorb(message),
            None => {
                self.conversations
                    .insert(counterpart, Conversation::from_message(message));
                true
            }
        }
    }

    /// Drop one message from a counterpart's unread set. Unknown
    /// counterparts and unknown ids are no-ops; the count is floored at
    /// zero by construction.
    pub fn apply_read_mark(&mut self, message_id: MessageId, counterpart: UserId) -> bool {
        match self.conversations.get_mut(&counterpart) {
            Some(conversation) => conversation.unread.remove(&message_id),
            None => false,
        }
    }

    /// Conversations ordered most-recent-first, ties broken by counterpart
    /// id for a stable listing.
    pub fn sorted(&self) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> = self.conversations.values().collect();
        list.sort_by(|a, b| {
            b.last_at
                .cmp(&a.last_at)
                .then_with(|| a.counterpart.cmp(&b.counterpart))
        });
        list
    }

    pub fn total_unread(&self) -> usize {
        self.conversations.values().map(Conversation::unread_count).sum()
    }
}

impl Default for ConversationIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campuschat_core::UNKNOWN_SENDER;

    fn msg(sender: UserId, name: &str, body: &str, ms: u64, read: bool) -> Message {
        Message {
            id: MessageId::new(),
            sender_id: sender,
            recipient_id: None,
            body: body.into(),
            created_at: Timestamp::from_millis(ms),
            read,
            sender_name: name.into(),
        }
    }

    #[test]
    fn rebuild_is_order_independent() {
        let viewer = UserId::new();
        let s1 = UserId::new();
        let messages = vec![
            msg(s1, "Jess", "first", 100, true),
            msg(s1, "Jess", "second", 200, false),
            msg(s1, "Jess", "third", 300, false),
        ];

        let mut forward = ConversationIndex::new();
        forward.rebuild(&messages, viewer);

        let reversed: Vec<Message> = messages.iter().rev().cloned().collect();
        let mut backward = ConversationIndex::new();
        backward.rebuild(&reversed, viewer);

        for index in [&forward, &backward] {
            let conv = index.get(s1).unwrap();
            assert_eq!(conv.last_body, "third");
            assert_eq!(conv.unread_count(), 2);
        }
    }

    #[test]
    fn rebuild_excludes_viewer_sends() {
        let viewer = UserId::new();
        let s1 = UserId::new();
        let messages = vec![
            msg(s1, "Jess", "help", 100, false),
            msg(viewer, "Admin", "on my way", 200, false),
        ];

        let mut index = ConversationIndex::new();
        index.rebuild(&messages, viewer);
        assert_eq!(index.len(), 1);

        // The viewer's reply is newer but must not become the preview.
        let conv = index.get(s1).unwrap();
        assert_eq!(conv.last_body, "help");
        assert_eq!(conv.unread_count(), 1);
    }

    #[test]
    fn insert_creates_and_updates_buckets() {
        let viewer = UserId::new();
        let s1 = UserId::new();
        let s2 = UserId::new();

        let mut index = ConversationIndex::new();
        assert!(index.apply_insert(&msg(s1, "Jess", "help", 100, false), viewer));
        assert!(index.apply_insert(&msg(s2, "Sam", "hi", 150, false), viewer));
        assert!(index.apply_insert(&msg(s1, "Jess", "anyone?", 200, false), viewer));

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(s1).unwrap().unread_count(), 2);
        assert_eq!(index.get(s1).unwrap().last_body, "anyone?");
        assert_eq!(index.get(s2).unwrap().unread_count(), 1);
        assert_eq!(index.total_unread(), 3);
    }

    #[test]
    fn later_message_resolves_fallback_name() {
        let viewer = UserId::new();
        let s1 = UserId::new();

        let mut index = ConversationIndex::new();
        index.apply_insert(&msg(s1, UNKNOWN_SENDER, "newest", 500, false), viewer);
        // An older message arriving late carries the resolved profile name.
        index.apply_insert(&msg(s1, "Jess Park", "older", 100, false), viewer);

        let conv = index.get(s1).unwrap();
        assert_eq!(conv.counterpart_name, "Jess Park");
        assert_eq!(conv.last_body, "newest");
    }

    #[test]
    fn stale_insert_keeps_newer_preview() {
        let viewer = UserId::new();
        let s1 = UserId::new();

        let mut index = ConversationIndex::new();
        index.apply_insert(&msg(s1, "Jess", "newest", 500, false), viewer);
        index.apply_insert(&msg(s1, "Jess", "older", 100, false), viewer);

        let conv = index.get(s1).unwrap();
        assert_eq!(conv.last_body, "newest");
        assert_eq!(conv.unread_count(), 2);
    }

    #[test]
    fn duplicate_insert_counts_unread_once() {
        let viewer = UserId::new();
        let s1 = UserId::new();
        let m = msg(s1, "Jess", "help", 100, false);

        let mut index = ConversationIndex::new();
        index.apply_insert(&m, viewer);
        index.apply_insert(&m, viewer);
        assert_eq!(index.get(s1).unwrap().unread_count(), 1);
    }

    #[test]
    fn read_mark_floors_at_zero() {
        let viewer = UserId::new();
        let s1 = UserId::new();
        let m = msg(s1, "Jess", "help", 100, false);

        let mut index = ConversationIndex::new();
        index.apply_insert(&m, viewer);

        assert!(index.apply_read_mark(m.id, s1));
        assert_eq!(index.get(s1).unwrap().unread_count(), 0);

        // Duplicate event, unknown id, unknown counterpart: all no-ops.
        assert!(!index.apply_read_mark(m.id, s1));
        assert!(!index.apply_read_mark(MessageId::new(), s1));
        assert!(!index.apply_read_mark(m.id, UserId::new()));
        assert_eq!(index.get(s1).unwrap().unread_count(), 0);
    }

    #[test]
    fn sorted_is_most_recent_first() {
        let viewer = UserId::new();
        let s1 = UserId::new();
        let s2 = UserId::new();

        let mut index = ConversationIndex::new();
        index.apply_insert(&msg(s1, "Jess", "early", 100, false), viewer);
        index.apply_insert(&msg(s2, "Sam", "late", 900, false), viewer);

        let order: Vec<UserId> = index.sorted().iter().map(|c| c.counterpart).collect();
        assert_eq!(order, vec![s2, s1]);
    }
}
