//! Request server for the message-queue protocol
//!
//! Owns the well-known channel and the sequence counter. Requests are served
//! strictly one at a time in the order the transport delivers them.

mod error;
mod server;

pub use error::{Result, ServerError};
pub use server::{Exchange, Server};
