//! Error types for the gateway

use ax25_ircd::IrcError;
use ax25_modem::ModemError;
use ax25_protocol::ParseError;
use thiserror::Error;

/// Errors that can occur wiring or running the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Modem backend error
    #[error("modem error: {0}")]
    Modem(#[from] ModemError),

    /// IRC server error
    #[error("IRC error: {0}")]
    Irc(#[from] IrcError),

    /// Packet encoding or address error
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// Scheduler already ran
    #[error("scheduler already started")]
    AlreadyRunning,
}

/// Rejected `#CONTROL` command; rendered as `ERROR: ...`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Command word not recognized
    #[error("unknown command {0} (try HELP)")]
    Unknown(String),

    /// Wrong arguments
    #[error("usage: {0}")]
    Usage(&'static str),

    /// Message mode name not recognized
    #[error("unknown message mode {0} (APRS or AX25)")]
    InvalidMode(String),

    /// Sender may not issue commands
    #[error("{0} is not an operator")]
    Unauthorized(String),
}
