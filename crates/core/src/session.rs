use serde::{Deserialize, Serialize};

use crate::ids::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// An end user with exactly one implicit conversation, with the
    /// elevated role.
    Standard,
    /// The single privileged viewer (support/admin) who selects among
    /// counterpart conversations.
    Elevated,
}

/// Who is looking at the chat, and (for the elevated role) at whom.
///
/// Lifecycle is tied to authentication: the engine resets timeline and
/// conversation index whenever viewer or role changes, and the timeline
/// alone whenever the selection changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerSession {
    pub viewer_id: UserId,
    pub role: Role,
    /// Selected counterpart; meaningful only for the elevated role.
    pub selected: Option<UserId>,
}

impl ViewerSession {
    pub fn standard(viewer_id: UserId) -> Self {
        Self {
            viewer_id,
            role: Role::Standard,
            selected: None,
        }
    }

    pub fn elevated(viewer_id: UserId) -> Self {
        Self {
            viewer_id,
            role: Role::Elevated,
            selected: None,
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.role == Role::Elevated
    }
}
