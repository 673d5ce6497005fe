//! One-shot client for the request server
//!
//! Each exchange opens the server's well-known channel, creates a private
//! reply channel named after the client identity, sends one request and
//! waits for exactly one reply. The reply channel is destroyed on every exit
//! path once it has been created.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::protocol::{ChannelName, Payload, Request, Response, RESPONSE_SIZE};
use crate::transport::{Channel, ChannelSpec, Transport};

/// Well-known channel the server listens on unless configured otherwise
pub const DEFAULT_SERVER_CHANNEL: &str = "/msgq-server";
/// Prefix for reply channel names unless configured otherwise
pub const DEFAULT_CLIENT_PREFIX: &str = "/msgq-client";

/// Where to send requests and how long to wait for a reply
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_channel: ChannelName,
    pub client_prefix: String,
    /// `None` waits forever
    pub reply_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(server_channel: ChannelName) -> Self {
        Self {
            server_channel,
            client_prefix: DEFAULT_CLIENT_PREFIX.to_string(),
            reply_timeout: None,
        }
    }

    pub fn with_client_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_prefix = prefix.into();
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.reply_timeout = timeout;
        self
    }
}

/// Performs request/reply exchanges over a [`Transport`]
#[derive(Debug, Clone)]
pub struct Client<T: Transport> {
    transport: T,
    config: ClientConfig,
    identity: u64,
}

impl<T: Transport> Client<T> {
    /// Create a client identified by the current process id
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self::with_identity(transport, config, u64::from(std::process::id()))
    }

    /// Create a client with an explicit identity
    ///
    /// The identity names the reply channel, so concurrent clients need
    /// distinct identities.
    pub fn with_identity(transport: T, config: ClientConfig, identity: u64) -> Self {
        Self {
            transport,
            config,
            identity,
        }
    }

    pub fn identity(&self) -> u64 {
        self.identity
    }

    /// Name of the reply channel this client creates
    pub fn reply_channel(&self) -> Result<ChannelName> {
        ChannelName::for_client(&self.config.client_prefix, self.identity)
    }

    /// Send `message` to the server and wait for its reply
    ///
    /// Oversized messages are rejected before any channel is touched.
    pub fn exchange(&self, message: &str) -> Result<Response> {
        let payload = Payload::new(message)?;
        let reply_to = self.reply_channel()?;

        let server = self.transport.open_write_only(&self.config.server_channel)?;
        let reply = ReplyChannel::create(&self.transport, &reply_to)?;

        let request = Request::new(&reply_to, self.identity, payload);
        trace!(
            "Sending request to {} (reply to {})",
            self.config.server_channel,
            reply_to
        );
        server.send(&request.encode())?;

        let response = self.await_reply(reply.channel())?;
        debug!(sequence_id = ?response.sequence_id(), "Received reply");
        Ok(response)
    }

    fn await_reply(&self, channel: &T::Channel) -> Result<Response> {
        let mut buf = vec![0u8; channel.message_size().max(RESPONSE_SIZE)];
        loop {
            let len = match self.config.reply_timeout {
                Some(timeout) => channel.receive_timeout(&mut buf, timeout)?,
                None => channel.receive(&mut buf)?,
            };
            match Response::decode(&buf[..len]) {
                Ok(response) => return Ok(response),
                Err(e) => warn!("Discarding reply: {}", e),
            }
        }
    }
}

/// A created reply channel, destroyed on drop
struct ReplyChannel<'a, T: Transport> {
    transport: &'a T,
    name: ChannelName,
    channel: T::Channel,
}

impl<'a, T: Transport> ReplyChannel<'a, T> {
    fn create(transport: &'a T, name: &ChannelName) -> Result<Self> {
        let channel = transport.create(name, ChannelSpec::replies())?;
        Ok(Self {
            transport,
            name: name.clone(),
            channel,
        })
    }

    fn channel(&self) -> &T::Channel {
        &self.channel
    }
}

// The handle itself is closed right after, when the `channel` field drops
impl<T: Transport> Drop for ReplyChannel<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.transport.destroy(&self.name) {
            warn!("Failed to destroy reply channel {}: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::{MSG_MAX_SIZE, REQUEST_SIZE};
    use crate::transport::MemoryTransport;
    use std::thread;

    fn server_name() -> ChannelName {
        ChannelName::new(DEFAULT_SERVER_CHANNEL).unwrap()
    }

    fn client(transport: &MemoryTransport, identity: u64) -> Client<MemoryTransport> {
        Client::with_identity(transport.clone(), ClientConfig::new(server_name()), identity)
    }

    /// Answer one request on the well-known channel with `reply`
    fn answer_once(
        transport: &MemoryTransport,
        reply: impl FnOnce(&Request) -> Vec<Vec<u8>> + Send + 'static,
    ) -> thread::JoinHandle<Request> {
        let server = transport.create(&server_name(), ChannelSpec::requests()).unwrap();
        let transport = transport.clone();
        thread::spawn(move || {
            let mut buf = vec![0u8; REQUEST_SIZE];
            let len = server.receive(&mut buf).unwrap();
            let request = Request::decode(&buf[..len]).unwrap();
            let channel = transport.open_write_only(&request.reply_channel().unwrap()).unwrap();
            for message in reply(&request) {
                channel.send(&message).unwrap();
            }
            request
        })
    }

    #[test]
    fn test_exchange() {
        let transport = MemoryTransport::new();
        let server = answer_once(&transport, |_| vec![Response::acknowledge(1).encode().to_vec()]);

        let client = client(&transport, 77);
        let response = client.exchange("hello").unwrap();
        assert_eq!(response.payload.as_str(), "Your message id = 1");

        let request = server.join().unwrap();
        assert_eq!(request.payload.as_str(), "hello");
        assert_eq!(request.sender_id, 77);
        assert_eq!(request.channel_name.as_str(), "/msgq-client-77");
        assert!(!transport.exists(&client.reply_channel().unwrap()));
    }

    #[test]
    fn test_missized_reply_is_skipped() {
        let transport = MemoryTransport::new();
        let _server = answer_once(&transport, |_| {
            vec![b"short".to_vec(), Response::acknowledge(9).encode().to_vec()]
        });

        let response = client(&transport, 1).exchange("hi").unwrap();
        assert_eq!(response.sequence_id(), Some(9));
    }

    #[test]
    fn test_oversized_message_is_rejected_before_sending() {
        let transport = MemoryTransport::new();
        let err = client(&transport, 1)
            .exchange(&"x".repeat(MSG_MAX_SIZE + 1))
            .unwrap_err();
        // No server exists, so reaching the transport would have produced NotFound
        assert!(matches!(err, Error::TooLong { .. }));
    }

    #[test]
    fn test_missing_server_leaves_no_reply_channel() {
        let transport = MemoryTransport::new();
        let client = client(&transport, 5);
        let err = client.exchange("hello").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!transport.exists(&client.reply_channel().unwrap()));
    }

    #[test]
    fn test_reply_channel_collision() {
        let transport = MemoryTransport::new();
        let _server = transport.create(&server_name(), ChannelSpec::requests()).unwrap();
        let client = client(&transport, 5);
        let _taken = transport
            .create(&client.reply_channel().unwrap(), ChannelSpec::replies())
            .unwrap();

        assert!(matches!(client.exchange("hello"), Err(Error::AlreadyExists(_))));
        // The existing channel belongs to someone else and must survive
        assert!(transport.exists(&client.reply_channel().unwrap()));
    }

    #[test]
    fn test_reply_timeout_cleans_up() {
        let transport = MemoryTransport::new();
        let _server = transport.create(&server_name(), ChannelSpec::requests()).unwrap();
        let config = ClientConfig::new(server_name())
            .with_reply_timeout(Some(Duration::from_millis(20)));
        let client = Client::with_identity(transport.clone(), config, 3);

        assert!(matches!(client.exchange("anyone?"), Err(Error::Timeout)));
        assert!(!transport.exists(&client.reply_channel().unwrap()));
        assert_eq!(transport.pending(&server_name()), Some(1));
    }
}
