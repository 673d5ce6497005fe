//! The serve loop and its sequence counter

use ipc::{Channel, ChannelName, ChannelSpec, Request, Response, Transport, REQUEST_SIZE};
use tracing::{debug, info, warn};

use crate::error::{Result, ServerError};

/// What happened to one received message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    /// The request got sequence id `id` and the reply was sent
    Replied { id: u64, sender_id: u64 },
    /// The request got sequence id `id` but the reply could not be sent
    Undelivered { id: u64, sender_id: u64 },
    /// The message was not a well-framed request; nothing was assigned
    Malformed { len: usize },
    /// The reply channel could not be opened; nothing was assigned
    Abandoned { channel: String },
}

/// Serves requests arriving on one well-known channel
///
/// Sequence ids start at 1 and are assigned only once a reply channel has
/// been opened, so the ids seen by clients form a contiguous run.
pub struct Server<T: Transport> {
    transport: T,
    name: ChannelName,
    channel: T::Channel,
    next_id: u64,
    buf: Vec<u8>,
}

impl<T: Transport> Server<T> {
    /// Create the well-known channel, replacing any stale one left behind
    pub fn bind(transport: T, name: ChannelName) -> Result<Self> {
        let channel = transport
            .recreate(&name, ChannelSpec::requests())
            .map_err(|source| ServerError::Bind {
                channel: name.to_string(),
                source,
            })?;
        let buf = vec![0u8; channel.message_size().max(REQUEST_SIZE)];

        info!("Server listening on {}", name);

        Ok(Self {
            transport,
            name,
            channel,
            next_id: 1,
            buf,
        })
    }

    pub fn channel_name(&self) -> &ChannelName {
        &self.name
    }

    /// The id the next accepted request will receive
    pub fn next_sequence_id(&self) -> u64 {
        self.next_id
    }

    /// Serve requests until the transport fails
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.serve_one()?;
        }
    }

    /// Block for one message and handle it
    ///
    /// Only a failing receive is an error; every per-request problem is
    /// logged and reported through [`Exchange`].
    pub fn serve_one(&mut self) -> Result<Exchange> {
        let len = self
            .channel
            .receive(&mut self.buf)
            .map_err(|source| ServerError::Receive {
                channel: self.name.to_string(),
                source,
            })?;

        let request = match Request::decode(&self.buf[..len]) {
            Ok(request) => request,
            Err(e) => {
                warn!("Discarding message on {}: {}", self.name, e);
                return Ok(Exchange::Malformed { len });
            }
        };

        let reply = match request
            .reply_channel()
            .and_then(|name| self.transport.open_write_only(&name))
        {
            Ok(channel) => channel,
            Err(e) => {
                warn!(
                    sender_id = request.sender_id,
                    "Abandoning '{}': cannot open reply channel {:?}: {}",
                    request.payload,
                    request.channel_name.as_str(),
                    e
                );
                return Ok(Exchange::Abandoned {
                    channel: request.channel_name.into_string(),
                });
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        info!("{}. Received '{}' from {}", id, request.payload, request.sender_id);

        let sender_id = request.sender_id;
        match reply.send(&Response::acknowledge(id).encode()) {
            Ok(()) => {
                debug!("Replied to {} with id {}", request.channel_name, id);
                Ok(Exchange::Replied { id, sender_id })
            }
            Err(e) => {
                warn!("Failed to send reply {} to {}: {}", id, request.channel_name, e);
                Ok(Exchange::Undelivered { id, sender_id })
            }
        }
    }
}
