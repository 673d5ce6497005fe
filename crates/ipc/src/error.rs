//! Error types for the message-queue protocol

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("String is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("String contains a NUL byte")]
    InteriorNul,

    #[error("Invalid channel name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("Channel {0} does not exist")]
    NotFound(String),

    #[error("Channel {0} already exists")]
    AlreadyExists(String),

    #[error("Timed out waiting for a message")]
    Timeout,

    #[error("{op} failed on {channel}: {source}")]
    Transport {
        op: &'static str,
        channel: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn transport(op: &'static str, channel: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            op,
            channel: channel.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
