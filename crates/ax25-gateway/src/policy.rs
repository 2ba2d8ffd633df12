//! Loop prevention for chat → RF traffic

use ax25_ircd::{is_channel_name, ConnectionKind};

/// Decide whether a chat direct message may be transmitted over RF
///
/// Only messages to a nick that is unknown or belongs to an RF station go
/// out; channel traffic and messages between network users stay in chat.
pub fn should_forward_to_rf(target: &str, resolved: Option<ConnectionKind>) -> bool {
    if is_channel_name(target) {
        return false;
    }
    match resolved {
        None | Some(ConnectionKind::Virtual) => true,
        Some(ConnectionKind::Real) => false,
    }
}
