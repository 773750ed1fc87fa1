//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - The input DTOs used by the repositories

pub mod chat_message;
pub mod chat_session;
