//! Error types for the IRC server

use thiserror::Error;

use crate::client::ClientId;

/// Errors that can occur in the IRC server
#[derive(Debug, Error)]
pub enum IrcError {
    /// Listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client not found
    #[error("client not found: {0}")]
    UnknownClient(ClientId),

    /// Nick not found
    #[error("no such nick: {0}")]
    NoSuchNick(String),

    /// Channel not found
    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    /// Nick held by a network client
    #[error("nickname in use: {0}")]
    NickInUse(String),

    /// Nick is not acceptable
    #[error("erroneous nickname: {0}")]
    ErroneousNick(String),

    /// Transport already closed
    #[error("server closed")]
    Closed,
}
