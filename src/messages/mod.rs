pub mod storage;
pub mod types;

pub use storage::MessageLog;
pub use types::{Author, Message, PLACEHOLDER_TEXT};
