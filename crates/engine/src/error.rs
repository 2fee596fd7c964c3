use campuschat_core::CoreError;
use campuschat_store::StoreError;
use thiserror::Error;

/// Failure taxonomy of the chat core. Nothing here is fatal: every variant
/// leaves the local state stale-but-consistent with a recoverable path.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Rejected locally before any I/O.
    #[error("message body is empty")]
    EmptyBody,

    /// The write failed; the optimistic entry has been rolled back and the
    /// original body is preserved for retry.
    #[error("send failed: {source}")]
    SendFailed { body: String, source: StoreError },

    /// A bulk read failed; timeline and conversation index were left at
    /// their last-known-good state.
    #[error("hydrate failed: {0}")]
    HydrateFailed(StoreError),

    #[error("subscribe failed: {0}")]
    SubscribeFailed(StoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}
