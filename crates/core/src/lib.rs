pub mod error;
pub mod ids;
pub mod message;
pub mod session;
pub mod timestamp;
pub mod visibility;

pub use error::CoreError;
pub use ids::*;
pub use message::{Message, UNKNOWN_SENDER};
pub use session::{Role, ViewerSession};
pub use timestamp::{StoreClock, Timestamp};
