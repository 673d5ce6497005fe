//! Protocol, transports and client for the message-queue request server
//!
//! A long-lived server reads fixed-size requests from one well-known
//! channel. Every client creates its own reply channel, names it in the
//! request, and waits for exactly one fixed-size reply on it.
//!
//! # Architecture
//!
//! ```text
//!  Client (pid 4242)                            Server
//! ┌──────────────────┐  /msgq-server        ┌──────────────────┐
//! │ Request {        │ ───────────────────> │ assign id        │
//! │   channel_name,  │                      │ log request      │
//! │   sender_id,     │  /msgq-client-4242   │                  │
//! │   payload }      │ <─────────────────── │ Response         │
//! └──────────────────┘                      └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use ipc::{ChannelName, Client, ClientConfig, PosixTransport};
//!
//! let config = ClientConfig::new(ChannelName::new("/msgq-server")?);
//! let client = Client::new(PosixTransport::new(), config);
//! let reply = client.exchange("hello")?;
//! println!("{}", reply.payload);
//! ```

mod client;
mod error;
mod protocol;
pub mod transport;

pub use client::{Client, ClientConfig, DEFAULT_CLIENT_PREFIX, DEFAULT_SERVER_CHANNEL};
pub use error::{Error, Result};
pub use protocol::{
    BoundedString, ChannelName, Payload, Request, Response, MSG_MAX_COUNT, MSG_MAX_SIZE,
    QNAME_MAX_SIZE, REQUEST_SIZE, RESPONSE_SIZE,
};
#[cfg(target_os = "linux")]
pub use transport::PosixTransport;
pub use transport::{Channel, ChannelSpec, MemoryTransport, Transport};
