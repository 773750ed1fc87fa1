//! Domain types shared by the chat server and its clients.
//!
//! - [`context`] -- the fixed HR context enumeration and its routing data.
//! - [`suggestions`] -- curated quick-start prompts per context.
//! - [`message`] -- message roles, content validation, title derivation.
//! - [`protocol`] -- the streaming wire format (fragments and terminal).

pub mod context;
pub mod error;
pub mod message;
pub mod protocol;
pub mod suggestions;
pub mod types;
