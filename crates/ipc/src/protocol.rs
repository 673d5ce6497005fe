//! Wire protocol for the request/reply exchange
//!
//! Both sides exchange fixed-size records. Every bounded string field takes
//! `MAX + 1` bytes on the wire: the content, then zero padding, so at least
//! one NUL always terminates the field.

use std::fmt;
use std::ops::Deref;

use crate::error::{Error, Result};

/// Maximum number of messages a channel holds before senders block
pub const MSG_MAX_COUNT: usize = 10;
/// Maximum payload length in bytes
pub const MSG_MAX_SIZE: usize = 256;
/// Maximum channel name length in bytes
pub const QNAME_MAX_SIZE: usize = 64;

const NAME_FIELD: usize = QNAME_MAX_SIZE + 1;
const SENDER_FIELD: usize = 8;
const PAYLOAD_FIELD: usize = MSG_MAX_SIZE + 1;

/// Exact size of an encoded [`Request`]
pub const REQUEST_SIZE: usize = NAME_FIELD + SENDER_FIELD + PAYLOAD_FIELD;
/// Exact size of an encoded [`Response`]
pub const RESPONSE_SIZE: usize = PAYLOAD_FIELD;

const ACK_PREFIX: &str = "Your message id = ";

/// An owned string of at most `MAX` bytes with no NUL bytes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BoundedString<const MAX: usize>(String);

/// Payload carried by requests and responses
pub type Payload = BoundedString<MSG_MAX_SIZE>;

impl<const MAX: usize> BoundedString<MAX> {
    /// Accept `value` only if it fits, without truncation
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.len() > MAX {
            return Err(Error::TooLong {
                len: value.len(),
                max: MAX,
            });
        }
        if value.contains('\0') {
            return Err(Error::InteriorNul);
        }
        Ok(Self(value))
    }

    /// Cut `value` at its first NUL and at the last char boundary within `MAX` bytes
    pub fn truncated(value: impl AsRef<str>) -> Self {
        let value = value.as_ref();
        let value = value.split('\0').next().unwrap_or_default();
        let mut end = value.len().min(MAX);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        Self(value[..end].to_owned())
    }

    /// Read a field from the wire, never looking past `MAX` bytes
    pub fn decode(field: &[u8]) -> Self {
        let window = &field[..field.len().min(MAX)];
        let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
        Self::truncated(String::from_utf8_lossy(&window[..end]))
    }

    fn encode_into(&self, field: &mut [u8]) {
        debug_assert!(field.len() > MAX);
        field.fill(0);
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl<const MAX: usize> Deref for BoundedString<MAX> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<const MAX: usize> fmt::Display for BoundedString<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated channel name: `/` followed by at least one character, no other `/`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(BoundedString<QNAME_MAX_SIZE>);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name: BoundedString<QNAME_MAX_SIZE> = BoundedString::new(name)?;
        let reason = match name.as_str().strip_prefix('/') {
            None => Some("must start with '/'"),
            Some("") => Some("must not be empty"),
            Some(rest) if rest.contains('/') => Some("must not contain '/' after the first character"),
            Some(_) => None,
        };
        match reason {
            Some(reason) => Err(Error::InvalidName {
                name: name.into_string(),
                reason,
            }),
            None => Ok(Self(name)),
        }
    }

    /// Build the reply channel name `<prefix>-<identity>` for one client
    ///
    /// Fails with [`Error::InvalidName`] when the prefix, or the prefix
    /// together with this particular identity, does not fit in a name.
    pub fn for_client(prefix: &str, identity: u64) -> Result<Self> {
        if prefix.len() >= QNAME_MAX_SIZE - 5 {
            return Err(Error::InvalidName {
                name: prefix.to_owned(),
                reason: "prefix leaves no room for the client identity",
            });
        }
        let name = format!("{}-{}", prefix, identity);
        if name.len() > QNAME_MAX_SIZE {
            return Err(Error::InvalidName {
                name,
                reason: "prefix and client identity exceed the name limit",
            });
        }
        Self::new(name)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for ChannelName {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request sent from a client to the server's well-known channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Name of the channel the reply goes to, as read off the wire
    pub channel_name: BoundedString<QNAME_MAX_SIZE>,
    /// Sender identity, informational only
    pub sender_id: u64,
    pub payload: Payload,
}

impl Request {
    pub fn new(reply_to: &ChannelName, sender_id: u64, payload: Payload) -> Self {
        Self {
            channel_name: reply_to.0.clone(),
            sender_id,
            payload,
        }
    }

    /// Validate the reply channel named by this request
    pub fn reply_channel(&self) -> Result<ChannelName> {
        ChannelName::new(self.channel_name.as_str())
    }

    pub fn encode(&self) -> [u8; REQUEST_SIZE] {
        let mut buf = [0u8; REQUEST_SIZE];
        let (name, rest) = buf.split_at_mut(NAME_FIELD);
        let (sender, payload) = rest.split_at_mut(SENDER_FIELD);
        self.channel_name.encode_into(name);
        sender.copy_from_slice(&self.sender_id.to_le_bytes());
        self.payload.encode_into(payload);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != REQUEST_SIZE {
            return Err(Error::FrameSize {
                expected: REQUEST_SIZE,
                actual: bytes.len(),
            });
        }
        let (name, rest) = bytes.split_at(NAME_FIELD);
        let (sender, payload) = rest.split_at(SENDER_FIELD);
        let mut sender_id = [0u8; SENDER_FIELD];
        sender_id.copy_from_slice(sender);

        Ok(Self {
            channel_name: BoundedString::decode(name),
            sender_id: u64::from_le_bytes(sender_id),
            payload: BoundedString::decode(payload),
        })
    }
}

/// A reply sent from the server to one client's reply channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub payload: Payload,
}

impl Response {
    /// The acknowledgment carrying an assigned sequence id
    pub fn acknowledge(id: u64) -> Self {
        Self {
            payload: BoundedString::truncated(format!("{}{}", ACK_PREFIX, id)),
        }
    }

    /// Sequence id embedded in an acknowledgment, if this is one
    pub fn sequence_id(&self) -> Option<u64> {
        self.payload.strip_prefix(ACK_PREFIX)?.parse().ok()
    }

    pub fn encode(&self) -> [u8; RESPONSE_SIZE] {
        let mut buf = [0u8; RESPONSE_SIZE];
        self.payload.encode_into(&mut buf);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != RESPONSE_SIZE {
            return Err(Error::FrameSize {
                expected: RESPONSE_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            payload: BoundedString::decode(bytes),
        })
    }
}
