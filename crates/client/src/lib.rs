//! Client for the hrchat streaming chat API.
//!
//! - [`transport`] -- the [`transport::ChatTransport`] seam and its reqwest
//!   implementation, which reads reply streams with `reqwest-eventsource`.
//! - [`conversation`] -- the I/O-free transcript state machine.
//! - [`consumer`] -- [`consumer::StreamConsumer`], which runs exchanges and
//!   keeps the conversation in sync with the server.
//! - [`repl`] -- command parsing and messages for the `hrchat` binary.

pub mod consumer;
pub mod conversation;
pub mod error;
pub mod model;
pub mod repl;
pub mod transport;

pub use consumer::StreamConsumer;
pub use conversation::{Conversation, Outcome, Phase, Ticket};
pub use error::ClientError;
pub use transport::{ChatTransport, HttpTransport};
