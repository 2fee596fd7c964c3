//! Pure visibility rules: which messages belong in a viewer's timeline,
//! and which conversation bucket a message falls into. No I/O.

use crate::ids::UserId;
use crate::message::Message;
use crate::session::{Role, ViewerSession};

/// Whether `msg` belongs in the timeline of the given viewer.
///
/// A message the viewer authored is always visible to them. Beyond that,
/// the elevated role sees the selected counterpart's messages (nothing,
/// with no selection), and a standard viewer sees messages they sent or
/// that were addressed to them.
pub fn is_visible(
    msg: &Message,
    role: Role,
    viewer: UserId,
    selected: Option<UserId>,
) -> bool {
    if msg.sender_id == viewer {
        return true;
    }
    match role {
        Role::Elevated => selected == Some(msg.sender_id),
        Role::Standard => msg.recipient_id == Some(viewer),
    }
}

/// Convenience over [`is_visible`] for an existing session.
pub fn visible_to(msg: &Message, session: &ViewerSession) -> bool {
    is_visible(msg, session.role, session.viewer_id, session.selected)
}

/// The conversation bucket `msg` belongs to, from the elevated viewer's
/// perspective. The viewer's own sends (including self-addressed ones)
/// never form a counterpart bucket.
pub fn bucket_for(msg: &Message, viewer: UserId) -> Option<UserId> {
    if msg.sender_id == viewer {
        None
    } else {
        Some(msg.sender_id)
    }
}
