pub mod changes;
pub mod error;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use changes::{ChangeEvent, Subscription};
pub use error::StoreError;
pub use sqlite::SqliteMessageStore;
pub use traits::*;
