pub mod storage;
pub mod types;

pub use storage::MessageLog;
pub use types::{Message, MessageId, Role};
