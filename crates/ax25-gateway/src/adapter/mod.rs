//! Protocol adapters
//!
//! An adapter owns the translation between one RF protocol and the chat
//! side: inbound packets become virtual-client traffic in its channels, and
//! chat messages become packets handed to the modem.

mod aprs;
mod ax25;

use std::borrow::Cow;
use std::sync::Arc;

use ax25_ircd::{Channel, ChatMessage, IrcError, IrcServer};
use ax25_modem::{ModemBackend, ModemError};
use ax25_protocol::{Address, Packet};
use tracing::{debug, warn};

use crate::state::GatewayState;

pub use aprs::{AprsAdapter, APRS_TOCALL};
pub use ax25::Ax25Adapter;

/// Every TNC2 line heard, untruncated
pub const CHANNEL_APRS_RAW: &str = "#APRS-RAW";
/// Decoded APRS summaries
pub const CHANNEL_APRS: &str = "#APRS";
/// APRS messages not addressed to a chat user
pub const CHANNEL_APRS_CHAT: &str = "#APRS-CHAT";
/// Plain AX.25 chat
pub const CHANNEL_AX25_CHAT: &str = "#AX25-CHAT";
/// Operator commands and status
pub const CHANNEL_CONTROL: &str = "#CONTROL";

/// Translates between one RF protocol and chat
pub trait ProtocolAdapter: Send + Sync {
    /// Adapter name for logs
    fn name(&self) -> &'static str;

    /// Channels this adapter publishes into
    fn channels(&self) -> Vec<Channel>;

    /// Publish an inbound packet to chat
    fn on_packet(&self, packet: Packet);

    /// Transmit a chat direct message over RF
    fn send_direct(&self, message: &ChatMessage);
}

/// Cut text to at most `max_len` characters; 0 means unlimited
pub fn truncate_chars(text: &str, max_len: usize) -> &str {
    if max_len == 0 {
        return text;
    }
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Modem handle shared by the adapters, counting what goes out
#[derive(Clone)]
pub(crate) struct Transmitter {
    modem: Arc<dyn ModemBackend>,
    state: Arc<GatewayState>,
}

impl Transmitter {
    pub fn new(modem: Arc<dyn ModemBackend>, state: Arc<GatewayState>) -> Self {
        Self { modem, state }
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Queue a packet on the modem
    pub fn transmit(&self, packet: Packet) -> Result<(), ModemError> {
        match self.modem.send(&packet) {
            Ok(()) => {
                debug!("Queued on {}: {}", self.modem.name(), packet);
                self.state.record_transmitted();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to transmit on {}: {}", self.modem.name(), e);
                self.state.record_transmit_failed();
                Err(e)
            }
        }
    }
}

/// Who traffic heard from one RF station is published as
pub(crate) enum Speaker {
    /// The station's own virtual client
    Station(String),
    /// A network user holds the callsign, so the server relays for it
    Relayed { server: String, callsign: String },
}

impl Speaker {
    /// Resolve the virtual client for `callsign`, joining it to `channels`
    pub fn resolve(server: &IrcServer, callsign: &str, channels: &[&str]) -> Option<Self> {
        match server.ensure_virtual_client(callsign, channels) {
            Ok(_) => Some(Self::Station(callsign.to_string())),
            Err(IrcError::NickInUse(_)) => {
                debug!("{} is held by a network user, relaying", callsign);
                Some(Self::Relayed {
                    server: server.server_name(),
                    callsign: callsign.to_string(),
                })
            }
            Err(e) => {
                warn!("No virtual client for {}: {}", callsign, e);
                None
            }
        }
    }

    /// Nick the traffic is sent from
    pub fn nick(&self) -> &str {
        match self {
            Self::Station(nick) => nick,
            Self::Relayed { server, .. } => server,
        }
    }

    /// Message text, tagged with the callsign when relayed
    pub fn text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            Self::Station(_) => Cow::Borrowed(text),
            Self::Relayed { callsign, .. } => Cow::Owned(format!("<{}> {}", callsign, text)),
        }
    }
}

/// Send a server NOTICE, logging when the client has gone
pub(crate) fn notify(server: &IrcServer, message: &ChatMessage, text: &str) {
    if let Err(e) = server.notice(message.sender_id, text) {
        debug!("Failed to notify {}: {}", message.sender, e);
    }
}

/// Resolve the RF source address for a chat sender
///
/// The sender's nick must be a valid callsign; otherwise they get a NOTICE
/// and nothing is transmitted.
pub(crate) fn sender_address(server: &IrcServer, message: &ChatMessage) -> Option<Address> {
    match message.sender.parse::<Address>() {
        Ok(address) => Some(address),
        Err(e) => {
            debug!("Not transmitting for {}: {}", message.sender, e);
            notify(
                server,
                message,
                &format!(
                    "{} is not a valid callsign, message not transmitted",
                    message.sender
                ),
            );
            None
        }
    }
}

/// Report a refused transmission back to the sender
pub(crate) fn notify_failure(server: &IrcServer, message: &ChatMessage, error: &ModemError) {
    notify(
        server,
        message,
        &format!("message to {} not transmitted: {}", message.target, error),
    );
}
