//! Per-viewer ordered message view for the selected conversation.
//!
//! Entries arrive from three sources that must reconcile into one view:
//! bulk hydrates, live stream inserts, and the viewer's own optimistic
//! sends. Dedup is by store id; optimistic entries carry a placeholder id
//! until the write acknowledgment (or its stream echo) confirms them.

use std::collections::HashSet;

use campuschat_core::{LocalId, Message, MessageId, ViewerSession, visibility};

/// How far apart a pending entry's local timestamp and a stream echo's
/// store timestamp may be for the two to count as the same logical send.
pub const ECHO_MATCH_WINDOW_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Locally authored, not yet acknowledged by the store. The entry's
    /// message carries a placeholder id.
    Pending(LocalId),
    /// Backed by a persisted store row.
    Confirmed(MessageId),
}

#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub delivery: Delivery,
    pub message: Message,
}

impl TimelineEntry {
    pub fn is_pending(&self) -> bool {
        matches!(self.delivery, Delivery::Pending(_))
    }
}

pub struct Timeline {
    entries: Vec<TimelineEntry>,
    /// Store ids already represented, across hydrate and stream sources.
    seen: HashSet<MessageId>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.seen.contains(&id)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }

    /// Replace the confirmed view with a deduplicated, time-ordered copy of
    /// `messages`. Pending entries survive, except those the hydrate result
    /// already represents (an optimistic send persisted before a reconnect).
    pub fn hydrate(&mut self, messages: Vec<Message>, session: &ViewerSession) {
        let pending: Vec<TimelineEntry> = self
            .entries
            .drain(..)
            .filter(TimelineEntry::is_pending)
            .collect();
        self.seen.clear();

        for message in messages {
            if !visibility::visible_to(&message, session) {
                continue;
            }
            if self.seen.insert(message.id) {
                self.entries.push(TimelineEntry {
                    delivery: Delivery::Confirmed(message.id),
                    message,
                });
            }
        }

        for entry in pending {
            if self.echo_of(&entry.message).is_some() {
                continue;
            }
            self.entries.push(entry);
        }
        self.sort();
    }

    /// Idempotent sorted insert. Returns false for invisible messages and
    /// duplicate ids. A pre-ack echo of a pending entry confirms that entry
    /// in place rather than adding a second bubble.
    pub fn apply_insert(&mut self, message: Message, session: &ViewerSession) -> bool {
        if !visibility::visible_to(&message, session) {
            return false;
        }
        if self.seen.contains(&message.id) {
            return false;
        }

        if message.sender_id == session.viewer_id {
            if let Some(index) = self.pending_match(&message) {
                self.seen.insert(message.id);
                self.entries[index] = TimelineEntry {
                    delivery: Delivery::Confirmed(message.id),
                    message,
                };
                self.sort();
                return true;
            }
        }

        self.seen.insert(message.id);
        self.entries.push(TimelineEntry {
            delivery: Delivery::Confirmed(message.id),
            message,
        });
        self.sort();
        true
    }

    /// Append a locally-authored entry before the store has acknowledged
    /// the write. The draft's id is a placeholder and is not entered into
    /// the dedup set.
    pub fn apply_optimistic(&mut self, draft: Message) -> LocalId {
        let local_id = LocalId::new();
        self.entries.push(TimelineEntry {
            delivery: Delivery::Pending(local_id),
            message: draft,
        });
        self.sort();
        local_id
    }

    /// Swap a pending entry for the authoritative store copy. Resolves at
    /// most once: returns false when the entry is gone or was already
    /// confirmed by a matching echo. A duplicate of an already-seen store
    /// id drops the leftover pending entry instead of double-displaying.
    pub fn confirm(&mut self, local_id: LocalId, authoritative: Message) -> bool {
        let Some(index) = self.pending_index(local_id) else {
            return false;
        };

        if self.seen.contains(&authoritative.id) {
            self.entries.remove(index);
            return false;
        }

        self.seen.insert(authoritative.id);
        self.entries[index] = TimelineEntry {
            delivery: Delivery::Confirmed(authoritative.id),
            message: authoritative,
        };
        self.sort();
        true
    }

    /// Roll back an optimistic entry after a failed write.
    pub fn remove_pending(&mut self, local_id: LocalId) -> bool {
        match self.pending_index(local_id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Flip the cached copy's read flag. Returns whether anything changed,
    /// which keeps unread accounting idempotent under duplicate events.
    pub fn mark_read(&mut self, id: MessageId) -> bool {
        for entry in &mut self.entries {
            if entry.delivery == Delivery::Confirmed(id) && !entry.message.read {
                entry.message.read = true;
                return true;
            }
        }
        false
    }

    fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.message.sort_key());
    }

    fn pending_index(&self, local_id: LocalId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.delivery == Delivery::Pending(local_id))
    }

    /// Index of a pending entry that `message` is an echo of: same sender,
    /// same body, timestamps within [`ECHO_MATCH_WINDOW_MS`].
    fn pending_match(&self, message: &Message) -> Option<usize> {
        self.entries.iter().position(|e| {
            e.is_pending()
                && e.message.sender_id == message.sender_id
                && e.message.body == message.body
                && e.message.created_at.abs_diff(message.created_at) <= ECHO_MATCH_WINDOW_MS
        })
    }

    fn echo_of(&self, draft: &Message) -> Option<&TimelineEntry> {
        self.entries.iter().find(|e| {
            !e.is_pending()
                && e.message.sender_id == draft.sender_id
                && e.message.body == draft.body
                && e.message.created_at.abs_diff(draft.created_at) <= ECHO_MATCH_WINDOW_MS
        })
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campuschat_core::{Timestamp, UserId, ViewerSession};

    fn msg(sender: UserId, body: &str, ms: u64) -> Message {
        Message {
            id: MessageId::new(),
            sender_id: sender,
            recipient_id: None,
            body: body.into(),
            created_at: Timestamp::from_millis(ms),
            read: false,
            sender_name: "Someone".into(),
        }
    }

    fn elevated_session(viewer: UserId, selected: UserId) -> ViewerSession {
        let mut session = ViewerSession::elevated(viewer);
        session.selected = Some(selected);
        session
    }

    #[test]
    fn hydrate_dedups_and_orders() {
        let viewer = UserId::new();
        let student = UserId::new();
        let session = elevated_session(viewer, student);

        let a = msg(student, "first", 100);
        let b = msg(student, "second", 200);
        let mut timeline = Timeline::new();
        timeline.hydrate(vec![b.clone(), a.clone(), b.clone()], &session);

        let bodies: Vec<&str> = timeline.messages().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[test]
    fn hydrate_drops_invisible_messages() {
        let viewer = UserId::new();
        let student = UserId::new();
        let other = UserId::new();
        let session = elevated_session(viewer, student);

        let mut timeline = Timeline::new();
        timeline.hydrate(vec![msg(student, "mine", 1), msg(other, "not mine", 2)], &session);
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn insert_is_idempotent() {
        let viewer = UserId::new();
        let student = UserId::new();
        let session = elevated_session(viewer, student);

        let m = msg(student, "help", 100);
        let mut timeline = Timeline::new();
        assert!(timeline.apply_insert(m.clone(), &session));
        assert!(!timeline.apply_insert(m.clone(), &session));
        assert!(!timeline.apply_insert(m, &session));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn insert_after_hydrate_dedups_by_id() {
        let viewer = UserId::new();
        let student = UserId::new();
        let session = elevated_session(viewer, student);

        let m = msg(student, "help", 100);
        let mut timeline = Timeline::new();
        timeline.hydrate(vec![m.clone()], &session);
        assert!(!timeline.apply_insert(m, &session));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn timestamp_ties_are_ordered_by_id() {
        let viewer = UserId::new();
        let student = UserId::new();
        let session = elevated_session(viewer, student);

        let mut first = msg(student, "a", 100);
        let mut second = msg(student, "b", 100);
        if first.id > second.id {
            std::mem::swap(&mut first.id, &mut second.id);
        }

        let mut timeline = Timeline::new();
        timeline.apply_insert(second.clone(), &session);
        timeline.apply_insert(first.clone(), &session);

        let ids: Vec<MessageId> = timeline.messages().map(|m| m.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn ack_then_echo_yields_one_entry() {
        let viewer = UserId::new();
        let session = elevated_session(viewer, UserId::new());

        let mut timeline = Timeline::new();
        let draft = msg(viewer, "on my way", 1_000);
        let local = timeline.apply_optimistic(draft);

        let authoritative = msg(viewer, "on my way", 1_050);
        assert!(timeline.confirm(local, authoritative.clone()));
        // The stream echo of the same insert arrives afterwards.
        assert!(!timeline.apply_insert(authoritative, &session));
        assert_eq!(timeline.len(), 1);
        assert!(!timeline.entries()[0].is_pending());
    }

    #[test]
    fn echo_before_ack_confirms_pending_in_place() {
        let viewer = UserId::new();
        let session = elevated_session(viewer, UserId::new());

        let mut timeline = Timeline::new();
        let draft = msg(viewer, "on my way", 1_000);
        let local = timeline.apply_optimistic(draft);

        // Echo lands before the write acknowledgment returns.
        let echo = msg(viewer, "on my way", 1_200);
        assert!(timeline.apply_insert(echo.clone(), &session));
        assert_eq!(timeline.len(), 1);
        assert!(!timeline.entries()[0].is_pending());

        // The late ack finds the entry already confirmed.
        assert!(!timeline.confirm(local, echo));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn echo_outside_window_is_a_new_entry() {
        let viewer = UserId::new();
        let session = elevated_session(viewer, UserId::new());

        let mut timeline = Timeline::new();
        timeline.apply_optimistic(msg(viewer, "hello", 1_000));

        let unrelated = msg(viewer, "hello", 1_000 + ECHO_MATCH_WINDOW_MS + 1);
        assert!(timeline.apply_insert(unrelated, &session));
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn remove_pending_rolls_back() {
        let viewer = UserId::new();

        let mut timeline = Timeline::new();
        let local = timeline.apply_optimistic(msg(viewer, "offline send", 1_000));
        assert_eq!(timeline.len(), 1);

        assert!(timeline.remove_pending(local));
        assert!(timeline.is_empty());
        assert!(!timeline.remove_pending(local));
    }

    #[test]
    fn hydrate_preserves_unacked_pending() {
        let viewer = UserId::new();
        let student = UserId::new();
        let session = elevated_session(viewer, student);

        let mut timeline = Timeline::new();
        timeline.apply_optimistic(msg(viewer, "still in flight", 5_000));
        timeline.hydrate(vec![msg(student, "help", 100)], &session);

        assert_eq!(timeline.len(), 2);
        assert!(timeline.entries()[1].is_pending());
    }

    #[test]
    fn hydrate_absorbs_persisted_pending() {
        let viewer = UserId::new();
        let student = UserId::new();
        let session = elevated_session(viewer, student);

        let mut timeline = Timeline::new();
        timeline.apply_optimistic(msg(viewer, "made it", 5_000));

        // Reconnect hydrate already contains the persisted copy.
        let persisted = msg(viewer, "made it", 5_040);
        timeline.hydrate(vec![persisted.clone()], &session);

        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.messages().next().unwrap().id, persisted.id);
    }

    #[test]
    fn mark_read_reports_transition_once() {
        let viewer = UserId::new();
        let student = UserId::new();
        let session = elevated_session(viewer, student);

        let m = msg(student, "help", 100);
        let mut timeline = Timeline::new();
        timeline.apply_insert(m.clone(), &session);

        assert!(timeline.mark_read(m.id));
        assert!(!timeline.mark_read(m.id));
        assert!(!timeline.mark_read(MessageId::new()));
        assert!(timeline.messages().next().unwrap().read);
    }
}
