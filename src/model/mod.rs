//! Domain model shared by the store, search and UI layers.

pub mod types;

pub use types::{ConversationKey, Message, TagPriority};
