//! Live sync connection lifecycle.
//!
//! `DISCONNECTED -> SUBSCRIBING -> LIVE -> (RECONNECTING | DISCONNECTED)`.
//! Events observed while SUBSCRIBING are buffered and replayed only after
//! the hydrate completes, so stream events racing the bulk read are neither
//! lost nor applied out of order. The feed has no resume offset, which
//! makes a full re-hydrate the correctness fallback after every reconnect.

use campuschat_store::{ChangeEvent, Subscription};

/// Resubscription attempts before the engine gives up and reports the
/// observable offline state.
pub const RECONNECT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Subscribing,
    Live,
    Reconnecting { attempt: u32 },
}

pub struct LiveSync {
    state: ConnectionState,
    subscription: Option<Subscription>,
    buffered: Vec<ChangeEvent>,
    /// Failed resubscription attempts in the current reconnect cycle.
    /// Survives `begin_subscribe` so a resubscribe that succeeds but never
    /// reaches LIVE still burns budget; cleared on `go_live`.
    attempts: u32,
}

impl LiveSync {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            subscription: None,
            buffered: Vec::new(),
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == ConnectionState::Live
    }

    /// Adopt a fresh subscription and enter SUBSCRIBING. Anything buffered
    /// from a previous stream is stale and dropped.
    pub fn begin_subscribe(&mut self, subscription: Subscription) {
        tracing::debug!(from = ?self.state, "entering SUBSCRIBING");
        self.subscription = Some(subscription);
        self.buffered.clear();
        self.state = ConnectionState::Subscribing;
    }

    /// Hold an event back until the in-flight hydrate completes.
    pub fn buffer(&mut self, event: ChangeEvent) {
        self.buffered.push(event);
    }

    /// Enter LIVE, handing back the events buffered during SUBSCRIBING for
    /// replay (the caller dedups them against the hydrate result by id).
    pub fn go_live(&mut self) -> Vec<ChangeEvent> {
        tracing::debug!(buffered = self.buffered.len(), "entering LIVE");
        self.state = ConnectionState::Live;
        self.attempts = 0;
        std::mem::take(&mut self.buffered)
    }

    /// The stream went away: drop it and enter RECONNECTING with a fresh
    /// attempt budget.
    pub fn stream_lost(&mut self) {
        tracing::debug!(from = ?self.state, "stream lost, entering RECONNECTING");
        self.subscription = None;
        self.buffered.clear();
        self.attempts = 0;
        self.state = ConnectionState::Reconnecting { attempt: 0 };
    }

    /// Record one failed reconnect attempt, whether the resubscription
    /// itself or the re-hydrate behind it failed. Returns whether another
    /// attempt is allowed under the policy.
    pub fn reconnect_failed(&mut self) -> bool {
        self.attempts += 1;
        self.subscription = None;
        self.buffered.clear();
        if self.attempts >= RECONNECT_ATTEMPTS {
            tracing::warn!(attempts = self.attempts, "reconnect attempts exhausted, going offline");
            self.state = ConnectionState::Disconnected;
            false
        } else {
            self.state = ConnectionState::Reconnecting {
                attempt: self.attempts,
            };
            true
        }
    }

    /// Drop the stream without any reconnect intent (session teardown).
    pub fn shutdown(&mut self) {
        self.subscription = None;
        self.buffered.clear();
        self.attempts = 0;
        self.state = ConnectionState::Disconnected;
    }

    /// Next pending event from the stream, non-blocking.
    pub fn poll(&mut self) -> Option<ChangeEvent> {
        self.subscription.as_ref()?.try_next()
    }
}

impl Default for LiveSync {
    fn default() -> Self {
        Self::new()
    }
}
