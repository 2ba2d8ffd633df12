//! Plain AX.25 chat and file transfer adapter

use ax25_ircd::{Channel, ChatMessage, ConnectionKind, IrcServer, MessageListener};
use ax25_protocol::{Address, ChatPacket, FileTransferPacket, Packet};
use tracing::{debug, warn};

use super::{
    notify, notify_failure, sender_address, truncate_chars, ProtocolAdapter, Speaker,
    Transmitter, CHANNEL_AX25_CHAT,
};

/// Longest chat text carried in one UI frame
pub const MAX_CHAT_LEN: usize = 254;

/// Bridges AX.25 UI chat to `#AX25-CHAT` and direct messages
pub struct Ax25Adapter {
    server: IrcServer,
    tx: Transmitter,
}

impl Ax25Adapter {
    pub(crate) fn new(server: IrcServer, tx: Transmitter) -> Self {
        Self { server, tx }
    }

    /// Deliver text from an RF station to a network user, or the channel
    fn publish(&self, speaker: &Speaker, dest: &Address, text: &str) {
        let text = speaker.text(truncate_chars(text, MAX_CHAT_LEN));
        let dest = dest.to_string();
        let to_user = !self.dest_is_broadcast(&dest)
            && self
                .server
                .client(&dest)
                .is_some_and(|c| c.kind == ConnectionKind::Real);

        let result = if to_user {
            self.server.send_direct(speaker.nick(), &dest, &text)
        } else {
            self.server
                .send_to_channel(speaker.nick(), CHANNEL_AX25_CHAT, &text)
        };
        if let Err(e) = result {
            warn!("Failed to publish chat from {}: {}", speaker.nick(), e);
        }
    }

    fn dest_is_broadcast(&self, dest: &str) -> bool {
        dest.parse::<Address>().map_or(true, |a| a.is_broadcast())
    }

    fn on_chat(&self, packet: ChatPacket) {
        let nick = packet.source.to_string();
        let Some(speaker) = Speaker::resolve(&self.server, &nick, &[CHANNEL_AX25_CHAT]) else {
            return;
        };
        self.publish(&speaker, &packet.dest, &packet.text);
    }

    fn on_file_transfer(&self, packet: FileTransferPacket) {
        let nick = packet.source.to_string();
        let Some(speaker) = Speaker::resolve(&self.server, &nick, &[CHANNEL_AX25_CHAT]) else {
            return;
        };
        let header = &packet.header;
        let end = header.offset + packet.data.len() as u64;
        let text = format!(
            "file {} bytes {}-{} of {} to {}",
            header.name, header.offset, end, header.total, packet.dest
        );
        self.publish(&speaker, &packet.dest, &text);
    }
}

impl ProtocolAdapter for Ax25Adapter {
    fn name(&self) -> &'static str {
        "AX.25"
    }

    fn channels(&self) -> Vec<Channel> {
        vec![Channel::new(
            CHANNEL_AX25_CHAT,
            "AX.25 UI chat, messages here are sent to CQ",
            MAX_CHAT_LEN,
        )]
    }

    fn on_packet(&self, packet: Packet) {
        match packet {
            Packet::Chat(p) => self.on_chat(p),
            Packet::FileTransfer(p) => self.on_file_transfer(p),
            other => debug!("AX.25 adapter ignoring {} packet", other.kind()),
        }
    }

    fn send_direct(&self, message: &ChatMessage) {
        let Some(source) = sender_address(&self.server, message) else {
            return;
        };
        let dest = match message.target.parse::<Address>() {
            Ok(dest) => dest,
            Err(_) => {
                notify(
                    &self.server,
                    message,
                    &format!("{} is not a valid callsign, message not transmitted", message.target),
                );
                return;
            }
        };
        let packet = Packet::Chat(ChatPacket {
            source,
            dest,
            path: Vec::new(),
            text: truncate_chars(&message.text, MAX_CHAT_LEN).to_string(),
        });
        if let Err(e) = self.tx.transmit(packet) {
            notify_failure(&self.server, message, &e);
        }
    }
}

/// `#AX25-CHAT` traffic from network users goes out addressed to `CQ`
impl MessageListener for Ax25Adapter {
    fn on_message(&self, server: &IrcServer, message: &ChatMessage) {
        if message.sender_kind == ConnectionKind::Virtual {
            return;
        }
        let Some(source) = sender_address(server, message) else {
            return;
        };
        let Ok(dest) = Address::new("CQ", 0) else {
            return;
        };
        let packet = Packet::Chat(ChatPacket {
            source,
            dest,
            path: Vec::new(),
            text: truncate_chars(&message.text, MAX_CHAT_LEN).to_string(),
        });
        if let Err(e) = self.tx.transmit(packet) {
            notify_failure(server, message, &e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ax25_ircd::{ClientId, ServerConfig};
    use ax25_modem::RadioMode;
    use ax25_protocol::Frame;

    use super::*;
    use crate::adapter::test_support::RecordingModem;
    use crate::state::GatewayState;

    fn setup(refuse: bool) -> (IrcServer, Arc<RecordingModem>, Ax25Adapter) {
        let server = IrcServer::new(ServerConfig::default());
        let modem = Arc::new(RecordingModem {
            refuse,
            ..Default::default()
        });
        let state = Arc::new(GatewayState::new(RadioMode::Kiss, 1000));
        let adapter = Ax25Adapter::new(server.clone(), Transmitter::new(modem.clone(), state));
        for channel in adapter.channels() {
            server.add_channel(channel);
        }
        (server, modem, adapter)
    }

    fn packet(tnc2: &str) -> Packet {
        Packet::from_frame(Frame::from_tnc2(tnc2).unwrap())
    }

    fn dm(sender: &str, target: &str, text: &str) -> ChatMessage {
        ChatMessage {
            sender: sender.into(),
            sender_id: ClientId(99),
            sender_kind: ConnectionKind::Real,
            target: target.into(),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_chat_creates_virtual_client() {
        let (server, _modem, adapter) = setup(false);
        adapter.on_packet(packet("N0CALL-7>CQ:hello all"));

        let info = server.client("N0CALL-7").unwrap();
        assert!(info.is_virtual());
        assert_eq!(info.channels, vec!["#AX25-CHAT".to_string()]);
        assert_eq!(server.channel("#AX25-CHAT").unwrap().members, 1);
    }

    #[tokio::test]
    async fn test_file_transfer_announced() {
        let (server, _modem, adapter) = setup(false);
        adapter.on_packet(packet("KB1ABC>N0CALL:#FILE:log.txt:0:5:hello"));
        assert!(server.client("KB1ABC").is_some());
    }

    #[test]
    fn test_direct_message_transmits_ui_frame() {
        let (_server, modem, adapter) = setup(false);
        adapter.send_direct(&dm("KB1ABC", "N0CALL-9", "ping"));

        let sent = modem.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_string(), "KB1ABC>N0CALL-9:ping");
    }

    #[test]
    fn test_direct_message_needs_callsigns() {
        let (_server, modem, adapter) = setup(false);
        adapter.send_direct(&dm("alice_", "N0CALL", "hi"));
        adapter.send_direct(&dm("KB1ABC", "not-a-call", "hi"));
        assert!(modem.sent().is_empty());
    }

    #[test]
    fn test_long_text_truncated() {
        let (_server, modem, adapter) = setup(false);
        adapter.send_direct(&dm("KB1ABC", "N0CALL", &"x".repeat(400)));
        match &modem.sent()[0] {
            Packet::Chat(p) => assert_eq!(p.text.len(), MAX_CHAT_LEN),
            other => panic!("Expected Chat, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_message_goes_to_cq() {
        let (server, modem, adapter) = setup(false);
        adapter.on_message(&server, &dm("KB1ABC", "#AX25-CHAT", "cq cq"));
        assert_eq!(modem.sent()[0].to_string(), "KB1ABC>CQ:cq cq");

        let mut from_rf = dm("N0CALL", "#AX25-CHAT", "echo");
        from_rf.sender_kind = ConnectionKind::Virtual;
        adapter.on_message(&server, &from_rf);
        assert_eq!(modem.sent().len(), 1);
    }
}
