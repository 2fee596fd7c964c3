//! The facade the surrounding application talks to: one `ChatClient` per
//! authenticated viewer session, owning the timeline, the conversation
//! index, the live sync lifecycle and the composer.
//!
//! All mutation happens on the caller's single logical thread: network-ish
//! calls go through the shared store handle, and stream events are drained
//! explicitly via [`ChatClient::pump`], never applied from another thread.

use std::cell::RefCell;
use std::rc::Rc;

use campuschat_core::{Message, MessageId, Role, UserId, ViewerSession};
use campuschat_store::{ChangeEvent, MessageFilter, MessageStore};

use crate::aggregator::ConversationIndex;
use crate::composer::Composer;
use crate::error::ChatError;
use crate::sync::{ConnectionState, LiveSync};
use crate::timeline::Timeline;

/// One store connection shared by every client of a process, borrowed only
/// for the duration of a single call.
pub type SharedStore<S> = Rc<RefCell<S>>;

/// Epoch token attached to an in-flight hydrate. Selection and session
/// changes bump the client's epoch; results arriving under a stale token
/// are dropped instead of clobbering the newer view.
#[derive(Debug, Clone, Copy)]
pub struct HydrateTicket {
    epoch: u64,
    selected: Option<UserId>,
}

/// Bulk-read results for one hydrate request.
pub struct HydrateData {
    timeline: Vec<Message>,
    /// Conversation-index input; `Some` only for the elevated role.
    inbound: Option<Vec<Message>>,
}

pub struct ChatClient<S: MessageStore> {
    store: SharedStore<S>,
    session: ViewerSession,
    timeline: Timeline,
    conversations: ConversationIndex,
    composer: Composer,
    sync: LiveSync,
    epoch: u64,
}

impl<S: MessageStore> ChatClient<S> {
    pub fn new(store: SharedStore<S>, session: ViewerSession) -> Self {
        Self {
            store,
            session,
            timeline: Timeline::new(),
            conversations: ConversationIndex::new(),
            composer: Composer::new(),
            sync: LiveSync::new(),
            epoch: 0,
        }
    }

    // ---- observable state ------------------------------------------------

    pub fn session(&self) -> &ViewerSession {
        &self.session
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn conversations(&self) -> &ConversationIndex {
        &self.conversations
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.sync.state()
    }

    // ---- session lifecycle -----------------------------------------------

    /// Subscribe to the change feed and hydrate. Hydrate strictly precedes
    /// the application of any event observed while subscribing.
    pub fn connect(&mut self) -> Result<(), ChatError> {
        let subscription = self
            .store
            .borrow_mut()
            .subscribe()
            .map_err(ChatError::SubscribeFailed)?;
        self.sync.begin_subscribe(subscription);

        if let Err(error) = self.refresh() {
            self.sync.shutdown();
            return Err(error);
        }

        let replay = self.sync.go_live();
        tracing::debug!(count = replay.len(), "replaying events buffered during subscribe");
        for event in replay {
            if !matches!(event, ChangeEvent::Disconnected) {
                self.apply_event(event);
            }
        }
        self.pump();
        Ok(())
    }

    /// Viewer or role changed: new session, full reset, stream released.
    pub fn set_session(&mut self, session: ViewerSession) {
        self.session = session;
        self.epoch += 1;
        self.timeline.reset();
        self.conversations.reset();
        self.sync.shutdown();
    }

    /// Select which counterpart the elevated viewer is looking at. Resets
    /// the timeline and invalidates any in-flight hydrate for the previous
    /// selection. No-op for standard viewers and for reselection.
    pub fn select_conversation(&mut self, counterpart: UserId) -> Result<(), ChatError> {
        if self.session.role != Role::Elevated {
            return Ok(());
        }
        if self.session.selected == Some(counterpart) {
            return Ok(());
        }
        self.session.selected = Some(counterpart);
        self.epoch += 1;
        self.timeline.reset();
        self.refresh()
    }

    pub fn clear_selection(&mut self) {
        if self.session.selected.is_none() {
            return;
        }
        self.session.selected = None;
        self.epoch += 1;
        self.timeline.reset();
    }

    // ---- hydrate ---------------------------------------------------------

    /// Snapshot the current epoch and selection for an async-style hydrate.
    pub fn begin_hydrate(&self) -> HydrateTicket {
        HydrateTicket {
            epoch: self.epoch,
            selected: self.session.selected,
        }
    }

    /// Perform the bulk reads for a ticket. Reads use the selection the
    /// ticket was issued under, not the current one.
    pub fn fetch_hydrate(&self, ticket: &HydrateTicket) -> Result<HydrateData, ChatError> {
        let store = self.store.borrow();
        let viewer = self.session.viewer_id;

        let timeline = match self.session.role {
            Role::Standard => store
                .query_messages(MessageFilter::Standard { viewer })
                .map_err(ChatError::HydrateFailed)?,
            Role::Elevated => match ticket.selected {
                Some(counterpart) => store
                    .query_messages(MessageFilter::Elevated {
                        viewer,
                        counterpart,
                    })
                    .map_err(ChatError::HydrateFailed)?,
                None => Vec::new(),
            },
        };

        let inbound = match self.session.role {
            Role::Elevated => Some(
                store
                    .query_messages(MessageFilter::InboundTo { viewer })
                    .map_err(ChatError::HydrateFailed)?,
            ),
            Role::Standard => None,
        };

        Ok(HydrateData { timeline, inbound })
    }

    /// Apply a completed hydrate, unless its ticket has gone stale.
    /// Returns whether the result was applied.
    pub fn apply_hydrate(&mut self, ticket: HydrateTicket, data: HydrateData) -> bool {
        if ticket.epoch != self.epoch {
            tracing::debug!(
                ticket_epoch = ticket.epoch,
                current_epoch = self.epoch,
                "dropping stale hydrate result"
            );
            return false;
        }
        self.timeline.hydrate(data.timeline, &self.session);
        if let Some(inbound) = data.inbound {
            self.conversations.rebuild(&inbound, self.session.viewer_id);
        }
        true
    }

    /// Synchronous hydrate: fetch and apply under one ticket. On failure
    /// the timeline and conversation index keep their last-known-good
    /// state.
    pub fn refresh(&mut self) -> Result<(), ChatError> {
        let ticket = self.begin_hydrate();
        let data = self.fetch_hydrate(&ticket)?;
        self.apply_hydrate(ticket, data);
        Ok(())
    }

    // ---- outgoing --------------------------------------------------------

    /// Validate, optimistically display, then persist. Elevated sends are
    /// addressed to the selected counterpart. On write failure the
    /// optimistic entry is rolled back and the trimmed body travels with
    /// the error for retry.
    pub fn send(&mut self, body: &str) -> Result<Message, ChatError> {
        let body = Composer::validate(body)?;
        let sender_id = self.session.viewer_id;
        let recipient_id = match self.session.role {
            Role::Elevated => self.session.selected,
            Role::Standard => None,
        };

        let sender_name = {
            let store = self.store.borrow();
            self.composer.sender_name(&*store, sender_id)
        };
        let draft = self
            .composer
            .draft(sender_id, sender_name, body.clone(), recipient_id)?;
        let local_id = self.timeline.apply_optimistic(draft);

        let written = self
            .store
            .borrow_mut()
            .insert_message(sender_id, &body, recipient_id);

        match written {
            Ok(authoritative) => {
                self.timeline.confirm(local_id, authoritative.clone());
                Ok(authoritative)
            }
            Err(source) => {
                self.timeline.remove_pending(local_id);
                tracing::warn!(%source, "send failed, optimistic entry rolled back");
                Err(ChatError::SendFailed { body, source })
            }
        }
    }

    /// Flip a message's read flag at the store and fold the change into
    /// local state. Standard viewers cannot mark anything read.
    pub fn mark_read(&mut self, message_id: MessageId) -> Result<bool, ChatError> {
        if self.session.role != Role::Elevated {
            return Ok(false);
        }
        let changed = self.store.borrow_mut().mark_read(message_id)?;
        if changed {
            self.timeline.mark_read(message_id);
            let sender = self
                .timeline
                .messages()
                .find(|m| m.id == message_id)
                .map(|m| m.sender_id);
            if let Some(sender) = sender {
                self.conversations.apply_read_mark(message_id, sender);
            }
        }
        Ok(changed)
    }

    // ---- live stream -----------------------------------------------------

    /// Drain pending change events. While SUBSCRIBING, events are buffered
    /// behind the in-flight hydrate; while LIVE they are applied directly.
    /// A disconnect triggers the reconnect policy.
    pub fn pump(&mut self) {
        while let Some(event) = self.sync.poll() {
            if matches!(event, ChangeEvent::Disconnected) {
                self.handle_disconnect();
                break;
            }
            match self.sync.state() {
                ConnectionState::Subscribing => self.sync.buffer(event),
                ConnectionState::Live => self.apply_event(event),
                _ => break,
            }
        }
    }

    fn apply_event(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Inserted(message) => {
                if self.session.is_elevated() {
                    self.conversations
                        .apply_insert(&message, self.session.viewer_id);
                }
                self.timeline.apply_insert(message, &self.session);
            }
            ChangeEvent::ReadMarked {
                message_id,
                sender_id,
            } => {
                self.timeline.mark_read(message_id);
                if self.session.is_elevated() {
                    self.conversations.apply_read_mark(message_id, sender_id);
                }
            }
            ChangeEvent::Disconnected => self.handle_disconnect(),
        }
    }

    fn handle_disconnect(&mut self) {
        self.sync.stream_lost();
        self.reconnect();
    }

    /// Attempt resubscription under the reconnect policy. Every successful
    /// resubscribe is followed by a full re-hydrate: the feed offers no
    /// resume offset, so re-reading is the correctness fallback. Exhausted
    /// attempts land in the observable DISCONNECTED state.
    pub fn reconnect(&mut self) {
        loop {
            let subscribed = self.store.borrow_mut().subscribe();
            match subscribed {
                Ok(subscription) => {
                    self.sync.begin_subscribe(subscription);
                    match self.refresh() {
                        Ok(()) => {
                            let replay = self.sync.go_live();
                            for event in replay {
                                if !matches!(event, ChangeEvent::Disconnected) {
                                    self.apply_event(event);
                                }
                            }
                            self.pump();
                            return;
                        }
                        Err(error) => {
                            tracing::warn!(%error, "re-hydrate after resubscribe failed");
                            if !self.sync.reconnect_failed() {
                                return;
                            }
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "resubscription failed");
                    if !self.sync.reconnect_failed() {
                        return;
                    }
                }
            }
        }
    }
}
