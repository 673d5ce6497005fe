//! POSIX message queue transport

use std::fmt;
use std::time::Duration;

use nix::errno::Errno;
use nix::mqueue::{
    mq_attr_member_t, mq_close, mq_getattr, mq_open, mq_receive, mq_send, mq_timedreceive,
    mq_unlink, MQ_OFlag, MqAttr, MqdT,
};
use nix::sys::stat::Mode;
use nix::sys::time::TimeSpec;
use nix::time::{clock_gettime, ClockId};
use tracing::{trace, warn};

use super::{Channel, ChannelSpec, Transport};
use crate::error::{Error, Result};
use crate::protocol::ChannelName;

/// Permissions for channels this process creates (rw-r--r--)
const CHANNEL_MODE: u32 = 0o644;

/// Channels backed by kernel message queues (`mq_overview(7)`)
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixTransport;

impl PosixTransport {
    pub fn new() -> Self {
        Self
    }
}

fn map_errno(op: &'static str, name: &ChannelName, errno: Errno) -> Error {
    match errno {
        Errno::ENOENT => Error::NotFound(name.to_string()),
        Errno::EEXIST => Error::AlreadyExists(name.to_string()),
        Errno::ETIMEDOUT => Error::Timeout,
        other => Error::transport(op, name.as_str(), other.into()),
    }
}

impl Transport for PosixTransport {
    type Channel = PosixChannel;

    fn create(&self, name: &ChannelName, spec: ChannelSpec) -> Result<PosixChannel> {
        let attr = MqAttr::new(
            0,
            spec.capacity as mq_attr_member_t,
            spec.message_size as mq_attr_member_t,
            0,
        );
        let flags = MQ_OFlag::O_CREAT | MQ_OFlag::O_EXCL | MQ_OFlag::O_RDONLY;
        let mqd = mq_open(
            name.as_str(),
            flags,
            Mode::from_bits_truncate(CHANNEL_MODE),
            Some(&attr),
        )
        .map_err(|e| map_errno("mq_open", name, e))?;

        trace!("Created channel {} ({:?})", name, spec);
        PosixChannel::from_descriptor(name, mqd)
    }

    fn open_write_only(&self, name: &ChannelName) -> Result<PosixChannel> {
        let mqd = mq_open(name.as_str(), MQ_OFlag::O_WRONLY, Mode::empty(), None)
            .map_err(|e| map_errno("mq_open", name, e))?;
        PosixChannel::from_descriptor(name, mqd)
    }

    fn destroy(&self, name: &ChannelName) -> Result<()> {
        mq_unlink(name.as_str()).map_err(|e| map_errno("mq_unlink", name, e))
    }
}

/// An open message queue descriptor, closed on drop
pub struct PosixChannel {
    name: ChannelName,
    mqd: Option<MqdT>,
    message_size: usize,
}

impl PosixChannel {
    fn from_descriptor(name: &ChannelName, mqd: MqdT) -> Result<Self> {
        // Wrap first so the descriptor is closed even if getattr fails
        let mut channel = Self {
            name: name.clone(),
            mqd: Some(mqd),
            message_size: 0,
        };
        let attr = mq_getattr(channel.descriptor()).map_err(|e| map_errno("mq_getattr", name, e))?;
        channel.message_size = attr.msgsize() as usize;
        Ok(channel)
    }

    fn descriptor(&self) -> &MqdT {
        self.mqd.as_ref().expect("descriptor is present until drop")
    }
}

impl Channel for PosixChannel {
    fn send(&self, message: &[u8]) -> Result<()> {
        loop {
            match mq_send(self.descriptor(), message, 0) {
                Err(Errno::EINTR) => continue,
                result => return result.map_err(|e| map_errno("mq_send", &self.name, e)),
            }
        }
    }

    fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        let mut priority = 0;
        loop {
            match mq_receive(self.descriptor(), buf, &mut priority) {
                Err(Errno::EINTR) => continue,
                result => return result.map_err(|e| map_errno("mq_receive", &self.name, e)),
            }
        }
    }

    fn receive_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let now = clock_gettime(ClockId::CLOCK_REALTIME)
            .map_err(|e| map_errno("clock_gettime", &self.name, e))?;
        let deadline = now + TimeSpec::from(timeout);
        let mut priority = 0;
        loop {
            match mq_timedreceive(self.descriptor(), buf, &mut priority, &deadline) {
                Err(Errno::EINTR) => continue,
                result => return result.map_err(|e| map_errno("mq_timedreceive", &self.name, e)),
            }
        }
    }

    fn message_size(&self) -> usize {
        self.message_size
    }
}

impl Drop for PosixChannel {
    fn drop(&mut self) {
        if let Some(mqd) = self.mqd.take() {
            if let Err(e) = mq_close(mqd) {
                warn!("Failed to close channel {}: {}", self.name, e);
            }
        }
    }
}

impl fmt::Debug for PosixChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PosixChannel")
            .field("name", &self.name)
            .field("message_size", &self.message_size)
            .finish()
    }
}
