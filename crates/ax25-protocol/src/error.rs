//! Error types for AX.25, KISS and APRS parsing and encoding

use thiserror::Error;

/// Errors that can occur while parsing or encoding packet data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame is shorter than the minimum AX.25 header
    #[error("frame too short: {len} bytes")]
    TooShort { len: usize },

    /// Address field is malformed
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Callsign text could not be parsed
    #[error("invalid callsign: {0}")]
    InvalidCallsign(String),

    /// SSID outside 0-15
    #[error("invalid SSID: {0}")]
    InvalidSsid(String),

    /// Too many digipeaters in the path (AX.25 allows 8)
    #[error("too many digipeaters: {0}")]
    TooManyDigipeaters(usize),

    /// Monitor-format (TNC2) line is malformed
    #[error("invalid TNC2 line: {0}")]
    InvalidTnc2(String),

    /// File transfer header is malformed
    #[error("invalid file transfer header: {0}")]
    InvalidFileHeader(String),

    /// Packet kind cannot be encoded for transmission
    #[error("packet cannot be encoded: {0}")]
    Unencodable(String),
}
