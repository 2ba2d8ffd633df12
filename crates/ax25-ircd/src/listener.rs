//! Listener traits and message events

use serde::{Deserialize, Serialize};

use crate::channel::is_channel_name;
use crate::client::{ClientId, ConnectionKind};
use crate::server::IrcServer;

/// A PRIVMSG accepted by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender nick
    pub sender: String,
    /// Sender client
    pub sender_id: ClientId,
    /// Whether the sender is a network client or an RF station
    pub sender_kind: ConnectionKind,
    /// Channel name or nick, as the sender wrote it
    pub target: String,
    /// Message text
    pub text: String,
}

impl ChatMessage {
    /// Check if the target is a channel
    pub fn is_channel_target(&self) -> bool {
        is_channel_name(&self.target)
    }
}

/// Receives messages sent to a channel or by a client
///
/// Called with the server lock released, so implementations may call back
/// into the server.
pub trait MessageListener: Send + Sync {
    /// Handle one message
    fn on_message(&self, server: &IrcServer, message: &ChatMessage);
}

/// Notified when a client completes registration
pub trait ClientConnectionListener: Send + Sync {
    /// Handle a newly registered client
    fn on_client(&self, server: &IrcServer, client: ClientId);
}
