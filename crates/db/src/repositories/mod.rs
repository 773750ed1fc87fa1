//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` as the first argument.

pub mod chat_message_repo;
pub mod chat_session_repo;

pub use chat_message_repo::ChatMessageRepo;
pub use chat_session_repo::ChatSessionRepo;
