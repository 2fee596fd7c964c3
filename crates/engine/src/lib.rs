pub mod aggregator;
pub mod client;
pub mod composer;
pub mod error;
pub mod sync;
pub mod timeline;

pub use aggregator::{Conversation, ConversationIndex};
pub use client::{ChatClient, HydrateData, HydrateTicket, SharedStore};
pub use composer::Composer;
pub use error::ChatError;
pub use sync::{ConnectionState, LiveSync, RECONNECT_ATTEMPTS};
pub use timeline::{Delivery, Timeline, TimelineEntry, ECHO_MATCH_WINDOW_MS};
