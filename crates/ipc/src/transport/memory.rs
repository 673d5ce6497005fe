//! In-process transport with the same blocking semantics as kernel queues
//!
//! Handles outlive `destroy`, as with `mq_unlink`: the name disappears but
//! open handles keep working until dropped.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{Channel, ChannelSpec, Transport};
use crate::error::{Error, Result};
use crate::protocol::ChannelName;

/// A process-local namespace of bounded FIFO channels
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    channels: Arc<Mutex<HashMap<ChannelName, Arc<Queue>>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` currently exists in the namespace
    pub fn exists(&self, name: &ChannelName) -> bool {
        self.namespace().contains_key(name)
    }

    /// Number of messages waiting on `name`, if it exists
    pub fn pending(&self, name: &ChannelName) -> Option<usize> {
        self.namespace().get(name).map(|queue| queue.lock().len())
    }

    fn namespace(&self) -> MutexGuard<'_, HashMap<ChannelName, Arc<Queue>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    type Channel = MemoryChannel;

    fn create(&self, name: &ChannelName, spec: ChannelSpec) -> Result<MemoryChannel> {
        let mut channels = self.namespace();
        if channels.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        let queue = Arc::new(Queue::new(spec));
        channels.insert(name.clone(), Arc::clone(&queue));
        Ok(MemoryChannel {
            name: name.clone(),
            queue,
        })
    }

    fn open_write_only(&self, name: &ChannelName) -> Result<MemoryChannel> {
        let queue = self
            .namespace()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(MemoryChannel {
            name: name.clone(),
            queue,
        })
    }

    fn destroy(&self, name: &ChannelName) -> Result<()> {
        self.namespace()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }
}

#[derive(Debug)]
struct Queue {
    spec: ChannelSpec,
    messages: Mutex<VecDeque<Vec<u8>>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Queue {
    fn new(spec: ChannelSpec) -> Self {
        Self {
            spec,
            messages: Mutex::new(VecDeque::with_capacity(spec.capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A handle on one in-memory channel
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    name: ChannelName,
    queue: Arc<Queue>,
}

impl MemoryChannel {
    fn too_large(&self, op: &'static str, len: usize) -> Error {
        Error::transport(
            op,
            self.name.as_str(),
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} bytes against a message size of {}", len, self.queue.spec.message_size),
            ),
        )
    }

    fn pop_into(&self, mut messages: MutexGuard<'_, VecDeque<Vec<u8>>>, buf: &mut [u8]) -> usize {
        let message = messages.pop_front().unwrap_or_default();
        drop(messages);
        self.queue.not_full.notify_one();
        buf[..message.len()].copy_from_slice(&message);
        message.len()
    }
}

impl Channel for MemoryChannel {
    fn send(&self, message: &[u8]) -> Result<()> {
        if message.len() > self.queue.spec.message_size {
            return Err(self.too_large("send", message.len()));
        }
        let capacity = self.queue.spec.capacity;
        let mut messages = self
            .queue
            .not_full
            .wait_while(self.queue.lock(), |m| m.len() >= capacity)
            .unwrap_or_else(PoisonError::into_inner);
        messages.push_back(message.to_vec());
        drop(messages);
        self.queue.not_empty.notify_one();
        Ok(())
    }

    fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.len() < self.queue.spec.message_size {
            return Err(self.too_large("receive", buf.len()));
        }
        let messages = self
            .queue
            .not_empty
            .wait_while(self.queue.lock(), |m| m.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        Ok(self.pop_into(messages, buf))
    }

    fn receive_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if buf.len() < self.queue.spec.message_size {
            return Err(self.too_large("receive", buf.len()));
        }
        let (messages, wait) = self
            .queue
            .not_empty
            .wait_timeout_while(self.queue.lock(), timeout, |m| m.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        if wait.timed_out() && messages.is_empty() {
            return Err(Error::Timeout);
        }
        Ok(self.pop_into(messages, buf))
    }

    fn message_size(&self) -> usize {
        self.queue.spec.message_size
    }
}
