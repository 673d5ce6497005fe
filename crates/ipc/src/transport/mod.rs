//! Channel transport seam
//!
//! A transport owns a namespace of named, bounded, fixed-message-size FIFO
//! channels. Sends block while a channel is full and receives block while it
//! is empty; a receive always yields exactly one whole message. Dropping a
//! channel handle closes it, `destroy` removes the name from the namespace.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::{ChannelName, MSG_MAX_COUNT, REQUEST_SIZE, RESPONSE_SIZE};

mod memory;
#[cfg(target_os = "linux")]
mod posix;

pub use memory::MemoryTransport;
#[cfg(target_os = "linux")]
pub use posix::PosixTransport;

/// Capacity and message size of a channel at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSpec {
    pub capacity: usize,
    pub message_size: usize,
}

impl ChannelSpec {
    /// The server's well-known channel
    pub fn requests() -> Self {
        Self {
            capacity: MSG_MAX_COUNT,
            message_size: REQUEST_SIZE,
        }
    }

    /// A client's reply channel
    pub fn replies() -> Self {
        Self {
            capacity: MSG_MAX_COUNT,
            message_size: RESPONSE_SIZE,
        }
    }
}

/// An open handle on one channel
pub trait Channel {
    /// Queue one message, blocking while the channel is full
    fn send(&self, message: &[u8]) -> Result<()>;

    /// Block until one message arrives and copy it into `buf`
    ///
    /// `buf` must be at least [`Channel::message_size`] bytes.
    fn receive(&self, buf: &mut [u8]) -> Result<usize>;

    /// Like [`Channel::receive`], failing with [`Error::Timeout`] after `timeout`
    fn receive_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Largest message this channel accepts
    fn message_size(&self) -> usize;
}

/// A namespace of channels
pub trait Transport {
    type Channel: Channel;

    /// Create `name` for reading; fails with [`Error::AlreadyExists`] if taken
    fn create(&self, name: &ChannelName, spec: ChannelSpec) -> Result<Self::Channel>;

    /// Open an existing channel for writing; fails with [`Error::NotFound`] if absent
    fn open_write_only(&self, name: &ChannelName) -> Result<Self::Channel>;

    /// Remove `name` from the namespace
    fn destroy(&self, name: &ChannelName) -> Result<()>;

    /// Destroy any stale channel left under `name`, then create it fresh
    fn recreate(&self, name: &ChannelName, spec: ChannelSpec) -> Result<Self::Channel> {
        match self.destroy(name) {
            Ok(()) => tracing::info!("Removed stale channel {}", name),
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.create(name, spec)
    }
}
