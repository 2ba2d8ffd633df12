//! Error types for modem backends

use ax25_protocol::ParseError;
use thiserror::Error;

/// Errors that can occur starting or using a modem backend
#[derive(Debug, Error)]
pub enum ModemError {
    /// `send` called before `start`
    #[error("backend not started")]
    NotStarted,

    /// `start` called twice
    #[error("backend already started")]
    AlreadyStarted,

    /// Outbound queue is saturated
    #[error("transmit queue full")]
    QueueFull,

    /// Backend cannot transmit
    #[error("backend is receive-only")]
    ReceiveOnly,

    /// Background task has exited
    #[error("backend stopped")]
    Stopped,

    /// Radio mode name not recognized
    #[error("unknown radio mode: {0}")]
    UnknownMode(String),

    /// Backend configuration string is unusable
    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Packet could not be encoded
    #[error("encode error: {0}")]
    Encode(#[from] ParseError),
}
