//! Shared test backend: one SQLite store behind a process-local handle,
//! with viewer clients hanging off it the way the real application wires
//! one store connection per authenticated session.

use std::cell::RefCell;
use std::rc::Rc;

use campuschat_core::{UserId, ViewerSession};
use campuschat_engine::{ChatClient, SharedStore};
use campuschat_store::{MessageStore, SqliteMessageStore, StoreError};

pub struct TestBackend {
    store: SharedStore<SqliteMessageStore>,
}

impl TestBackend {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self {
            store: Rc::new(RefCell::new(SqliteMessageStore::open_in_memory()?)),
        })
    }

    pub fn store(&self) -> SharedStore<SqliteMessageStore> {
        Rc::clone(&self.store)
    }

    /// Register a profile and hand back its id.
    pub fn add_user(&self, full_name: &str) -> Result<UserId, StoreError> {
        let user_id = UserId::new();
        self.store.borrow_mut().upsert_profile(user_id, full_name)?;
        Ok(user_id)
    }

    /// A client for the elevated (support/admin) viewer.
    pub fn elevated_client(&self, viewer_id: UserId) -> ChatClient<SqliteMessageStore> {
        ChatClient::new(self.store(), ViewerSession::elevated(viewer_id))
    }

    /// A client for a standard (end-user) viewer.
    pub fn standard_client(&self, viewer_id: UserId) -> ChatClient<SqliteMessageStore> {
        ChatClient::new(self.store(), ViewerSession::standard(viewer_id))
    }

    /// Simulate the backend becoming unreachable (or reachable again).
    pub fn set_online(&self, online: bool) {
        self.store.borrow_mut().set_online(online);
    }

    /// Kill every live change stream, as a transport drop would.
    pub fn drop_streams(&self) {
        self.store.borrow_mut().disconnect_streams();
    }

    pub fn subscriber_count(&self) -> usize {
        self.store.borrow().subscriber_count()
    }

    /// Append a message directly, bypassing any client. Useful for seeding
    /// state that predates a client's connect.
    pub fn seed_message(
        &self,
        sender_id: UserId,
        body: &str,
        recipient_id: Option<UserId>,
    ) -> Result<campuschat_core::Message, StoreError> {
        self.store
            .borrow_mut()
            .insert_message(sender_id, body, recipient_id)
    }
}
