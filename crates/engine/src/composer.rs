//! Outgoing message validation and the optimistic send flow's drafts.

use std::collections::HashMap;

use campuschat_core::{Message, MessageId, Timestamp, UNKNOWN_SENDER, UserId, timestamp};
use campuschat_store::MessageStore;

use crate::error::ChatError;

pub struct Composer {
    /// Read-through cache over the store's profile lookups.
    names: HashMap<UserId, String>,
}

impl Composer {
    pub fn new() -> Self {
        Self {
            names: HashMap::new(),
        }
    }

    /// Local validation, before any I/O: a body must be non-empty after
    /// trimming. Returns the trimmed body that will be persisted.
    pub fn validate(body: &str) -> Result<String, ChatError> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyBody);
        }
        Ok(trimmed.to_string())
    }

    /// The sender's display name, resolved through the cache. Lookup
    /// failures degrade to the unknown-sender fallback; the draft's name
    /// is display-only and the authoritative copy re-resolves it anyway.
    pub fn sender_name<S: MessageStore>(&mut self, store: &S, user_id: UserId) -> String {
        if let Some(name) = self.names.get(&user_id) {
            return name.clone();
        }
        match store.resolve_profile_name(user_id) {
            Ok(Some(name)) => {
                self.names.insert(user_id, name.clone());
                name
            }
            Ok(None) => UNKNOWN_SENDER.to_string(),
            Err(error) => {
                tracing::warn!(%user_id, %error, "profile lookup failed, using fallback name");
                UNKNOWN_SENDER.to_string()
            }
        }
    }

    /// Build the optimistic timeline entry for a send. The id is a local
    /// placeholder, replaced when the authoritative copy arrives.
    pub fn draft(
        &mut self,
        sender_id: UserId,
        sender_name: String,
        body: String,
        recipient_id: Option<UserId>,
    ) -> Result<Message, ChatError> {
        let now = timestamp::physical_now()?;
        Ok(Message {
            id: MessageId::new(),
            sender_id,
            recipient_id,
            body,
            created_at: Timestamp::from_millis(now),
            read: false,
            sender_name,
        })
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}
