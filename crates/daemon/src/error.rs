//! Error types for the request server

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to create channel {channel}: {source}")]
    Bind {
        channel: String,
        #[source]
        source: ipc::Error,
    },

    #[error("Failed to receive on {channel}: {source}")]
    Receive {
        channel: String,
        #[source]
        source: ipc::Error,
    },
}

pub type Result<T> = std::result::Result<T, ServerError>;
