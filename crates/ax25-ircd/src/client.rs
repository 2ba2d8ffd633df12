//! Client registry entries

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Unique identifier for a connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Whether a client is a network user or a synthesized RF station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// Network chat client
    Real,
    /// RF station identity
    Virtual,
}

/// Transport behind a client
#[derive(Debug)]
pub enum Connection {
    /// Network client; lines are queued to its writer task
    Real {
        /// Peer address for logs
        addr: String,
        /// Outgoing line queue
        tx: mpsc::UnboundedSender<String>,
    },
    /// Synthesized client without a socket
    Virtual,
}

impl Connection {
    /// Connection kind
    pub fn kind(&self) -> ConnectionKind {
        match self {
            Connection::Real { .. } => ConnectionKind::Real,
            Connection::Virtual => ConnectionKind::Virtual,
        }
    }
}

/// Registered or registering client
#[derive(Debug)]
pub struct Client {
    /// Identifier
    pub id: ClientId,
    /// Nick, once given
    pub nick: Option<String>,
    /// Username from USER
    pub user: Option<String>,
    /// Real name from USER
    pub realname: String,
    /// Transport
    pub connection: Connection,
    /// Joined channels, display names
    pub channels: BTreeSet<String>,
    /// Last activity in ms since the UNIX epoch, 0 = never
    pub last_active: u64,
    /// NICK and USER both received
    pub registered: bool,
}

impl Client {
    /// Create a network client awaiting registration
    pub fn new_real(id: ClientId, addr: String, tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            nick: None,
            user: None,
            realname: String::new(),
            connection: Connection::Real { addr, tx },
            channels: BTreeSet::new(),
            last_active: 0,
            registered: false,
        }
    }

    /// Create a registered virtual client for an RF station
    pub fn new_virtual(id: ClientId, nick: String) -> Self {
        Self {
            id,
            user: Some(nick.to_ascii_lowercase()),
            realname: format!("RF station {}", nick),
            nick: Some(nick),
            connection: Connection::Virtual,
            channels: BTreeSet::new(),
            last_active: 0,
            registered: true,
        }
    }

    /// Connection kind
    pub fn kind(&self) -> ConnectionKind {
        self.connection.kind()
    }

    /// Nick, or `*` before one is set
    pub fn nick_or_star(&self) -> &str {
        self.nick.as_deref().unwrap_or("*")
    }

    /// Message prefix `nick!user@host`
    pub fn prefix(&self) -> String {
        let host = match self.connection {
            Connection::Real { .. } => "irc",
            Connection::Virtual => "radio",
        };
        format!(
            "{}!{}@{}",
            self.nick_or_star(),
            self.user.as_deref().unwrap_or("unknown"),
            host
        )
    }

    /// Queue a line to the client; virtual clients drop it
    pub fn send_line(&self, line: impl Into<String>) {
        if let Connection::Real { tx, .. } = &self.connection {
            if tx.send(line.into()).is_err() {
                debug!("Writer for {} already gone", self.id);
            }
        }
    }

    /// Snapshot for callers outside the server lock
    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            id: self.id,
            nick: self.nick_or_star().to_string(),
            kind: self.kind(),
            channels: self.channels.iter().cloned().collect(),
            last_active: self.last_active,
            addr: match &self.connection {
                Connection::Real { addr, .. } => Some(addr.clone()),
                Connection::Virtual => None,
            },
        }
    }
}

/// Read-only view of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Identifier
    pub id: ClientId,
    /// Nick
    pub nick: String,
    /// Real or virtual
    pub kind: ConnectionKind,
    /// Joined channels
    pub channels: Vec<String>,
    /// Last activity in ms since the UNIX epoch, 0 = never
    pub last_active: u64,
    /// Peer address of network clients
    pub addr: Option<String>,
}

impl ClientInfo {
    /// Check if this is a synthesized RF station
    pub fn is_virtual(&self) -> bool {
        self.kind == ConnectionKind::Virtual
    }
}

/// Check whether a nick is acceptable
///
/// Callsigns may start with a digit and carry an `-SSID`, so the first
/// character is only barred from being `-`.
pub fn is_valid_nick(nick: &str) -> bool {
    !nick.is_empty()
        && nick.len() <= 30
        && !nick.starts_with('-')
        && nick
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_[]\\`^{}|".contains(c))
}

/// Case-insensitive lookup key for nicks and channel names
pub fn fold_case(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_nicks() {
        assert!(is_valid_nick("alice"));
        assert!(is_valid_nick("N0CALL-9"));
        assert!(is_valid_nick("2E0ABC"));
        assert!(is_valid_nick("[bot]"));
        assert!(!is_valid_nick(""));
        assert!(!is_valid_nick("-dash"));
        assert!(!is_valid_nick("has space"));
        assert!(!is_valid_nick("#chan"));
    }

    #[test]
    fn test_virtual_client_prefix() {
        let client = Client::new_virtual(ClientId(3), "N0CALL".into());
        assert_eq!(client.prefix(), "N0CALL!n0call@radio");
        assert!(client.registered);
        assert!(client.info().is_virtual());
    }

    #[test]
    fn test_real_client_lines_are_queued() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = Client::new_real(ClientId(1), "127.0.0.1:5555".into(), tx);
        assert_eq!(client.nick_or_star(), "*");
        client.send_line("PING :x");
        assert_eq!(rx.try_recv().unwrap(), "PING :x");
        assert_eq!(client.info().addr.as_deref(), Some("127.0.0.1:5555"));
    }
}
