//! APRS adapter

use std::sync::atomic::{AtomicU32, Ordering};

use ax25_ircd::{Channel, ChatMessage, ConnectionKind, IrcServer, MessageListener};
use ax25_protocol::aprs::{format_message, format_status, MAX_MESSAGE_LEN, MAX_STATUS_LEN};
use ax25_protocol::{Address, AprsData, AprsPacket, Packet};
use tracing::{debug, warn};

use super::{
    notify_failure, sender_address, truncate_chars, ProtocolAdapter, Speaker, Transmitter,
    CHANNEL_APRS, CHANNEL_APRS_CHAT, CHANNEL_APRS_RAW,
};

/// Destination used for packets this gateway originates
pub const APRS_TOCALL: &str = "APZIRC";

/// Highest APRS message number before wrapping
const MAX_MESSAGE_ID: u32 = 99_999;

/// Bridges APRS traffic to the `#APRS*` channels and messages to users
pub struct AprsAdapter {
    server: IrcServer,
    tx: Transmitter,
    path: Vec<Address>,
    next_id: AtomicU32,
}

impl AprsAdapter {
    pub(crate) fn new(server: IrcServer, tx: Transmitter, path: Vec<Address>) -> Self {
        Self {
            server,
            tx,
            path,
            next_id: AtomicU32::new(0),
        }
    }

    fn next_message_id(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) % MAX_MESSAGE_ID + 1;
        id.to_string()
    }

    fn originate(&self, source: Address, info: String) -> Option<Packet> {
        match APRS_TOCALL.parse::<Address>() {
            Ok(dest) => Some(Packet::Aprs(AprsPacket::new(source, dest, self.path.clone(), info))),
            Err(e) => {
                warn!("Bad APRS tocall {}: {}", APRS_TOCALL, e);
                None
            }
        }
    }

    fn publish(&self, speaker: &Speaker, channel: &str, text: &str) {
        if let Err(e) = self
            .server
            .send_to_channel(speaker.nick(), channel, &speaker.text(text))
        {
            warn!("Failed to publish to {}: {}", channel, e);
        }
    }

    fn on_aprs(&self, raw: &str, packet: AprsPacket) {
        let nick = packet.source.to_string();
        let channels = [CHANNEL_APRS_RAW, CHANNEL_APRS, CHANNEL_APRS_CHAT];
        let Some(speaker) = Speaker::resolve(&self.server, &nick, &channels) else {
            return;
        };

        self.publish(&speaker, CHANNEL_APRS_RAW, raw);
        let summary = packet.data.summary();
        self.publish(&speaker, CHANNEL_APRS, truncate_chars(&summary, MAX_STATUS_LEN));

        if let AprsData::Message {
            addressee, text, ..
        } = &packet.data
        {
            let text = truncate_chars(text, MAX_MESSAGE_LEN);
            let to_user = self
                .server
                .client(addressee)
                .is_some_and(|c| c.kind == ConnectionKind::Real);
            if to_user {
                let text = speaker.text(text);
                if let Err(e) = self.server.send_direct(speaker.nick(), addressee, &text) {
                    warn!("Failed to deliver APRS message to {}: {}", addressee, e);
                }
            } else {
                self.publish(&speaker, CHANNEL_APRS_CHAT, text);
            }
        }
    }
}

impl ProtocolAdapter for AprsAdapter {
    fn name(&self) -> &'static str {
        "APRS"
    }

    fn channels(&self) -> Vec<Channel> {
        vec![
            Channel::new(CHANNEL_APRS_RAW, "Raw APRS traffic (TNC2)", 0),
            Channel::new(CHANNEL_APRS, "Decoded APRS, messages here are sent as status", MAX_STATUS_LEN),
            Channel::new(CHANNEL_APRS_CHAT, "APRS messages, messages here are sent to CQ", MAX_MESSAGE_LEN),
        ]
    }

    fn on_packet(&self, packet: Packet) {
        let raw = packet.to_string();
        match packet {
            Packet::Aprs(p) => self.on_aprs(&raw, p),
            other => debug!("APRS adapter ignoring {} packet", other.kind()),
        }
    }

    fn send_direct(&self, message: &ChatMessage) {
        let Some(source) = sender_address(&self.server, message) else {
            return;
        };
        let id = self.next_message_id();
        let info = format_message(&message.target.to_ascii_uppercase(), &message.text, Some(&id));
        let Some(packet) = self.originate(source, info) else {
            return;
        };
        if let Err(e) = self.tx.transmit(packet) {
            notify_failure(&self.server, message, &e);
        }
    }
}

/// `#APRS-CHAT` goes out as a message to `CQ`, `#APRS` as a status report
impl MessageListener for AprsAdapter {
    fn on_message(&self, server: &IrcServer, message: &ChatMessage) {
        if message.sender_kind == ConnectionKind::Virtual {
            return;
        }
        let info = if message.target.eq_ignore_ascii_case(CHANNEL_APRS_CHAT) {
            format_message("CQ", &message.text, None)
        } else if message.target.eq_ignore_ascii_case(CHANNEL_APRS) {
            format_status(&message.text)
        } else {
            return;
        };
        let Some(source) = sender_address(server, message) else {
            return;
        };
        let Some(packet) = self.originate(source, info) else {
            return;
        };
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

    fn setup(refuse: bool) -> (IrcServer, Arc<RecordingModem>, Arc<GatewayState>, AprsAdapter) {
        let server = IrcServer::new(ServerConfig::default());
        let modem = Arc::new(RecordingModem {
            refuse,
            ..Default::default()
        });
        let state = Arc::new(GatewayState::new(RadioMode::Kiss, 1000));
        let path = vec!["WIDE1-1".parse().unwrap(), "WIDE2-1".parse().unwrap()];
        let adapter = AprsAdapter::new(
            server.clone(),
            Transmitter::new(modem.clone(), state.clone()),
            path,
        );
        for channel in adapter.channels() {
            server.add_channel(channel);
        }
        (server, modem, state, adapter)
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

    #[test]
    fn test_inbound_joins_aprs_channels() {
        let (server, _modem, _state, adapter) = setup(false);
        let frame = Frame::from_tnc2("N0CALL>APRS,WIDE1-1::KB1ABC   :hello{3").unwrap();
        adapter.on_packet(Packet::from_frame(frame));

        let info = server.client("N0CALL").unwrap();
        assert!(info.is_virtual());
        assert_eq!(info.channels.len(), 3);
        assert_eq!(server.channel("#APRS-CHAT").unwrap().members, 1);
    }

    #[test]
    fn test_direct_message_numbered() {
        let (_server, modem, state, adapter) = setup(false);
        adapter.send_direct(&dm("KB1ABC", "n0call", "hello"));
        adapter.send_direct(&dm("KB1ABC", "n0call", "again"));

        let sent = modem.sent();
        assert_eq!(sent.len(), 2);
        match &sent[0] {
            Packet::Aprs(p) => {
                assert_eq!(p.dest.callsign, APRS_TOCALL);
                assert_eq!(p.path.len(), 2);
                assert_eq!(p.info, ":N0CALL   :hello{1");
                assert!(matches!(p.data, AprsData::Message { .. }));
            }
            other => panic!("Expected Aprs, got {:?}", other),
        }
        match &sent[1] {
            Packet::Aprs(p) => assert_eq!(p.info, ":N0CALL   :again{2"),
            other => panic!("Expected Aprs, got {:?}", other),
        }
        assert_eq!(state.counters().transmitted, 2);
    }

    #[test]
    fn test_message_id_wraps() {
        let (_server, _modem, _state, adapter) = setup(false);
        adapter.next_id.store(MAX_MESSAGE_ID - 1, Ordering::Relaxed);
        assert_eq!(adapter.next_message_id(), "99999");
        assert_eq!(adapter.next_message_id(), "1");
    }

    #[test]
    fn test_refused_transmission_counted() {
        let (_server, modem, state, adapter) = setup(true);
        adapter.send_direct(&dm("KB1ABC", "N0CALL", "hello"));
        assert!(modem.sent().is_empty());
        assert_eq!(state.counters().transmit_failed, 1);
    }

    #[test]
    fn test_channel_messages() {
        let (server, modem, _state, adapter) = setup(false);
        adapter.on_message(&server, &dm("KB1ABC", "#aprs-chat", "anyone around"));
        adapter.on_message(&server, &dm("KB1ABC", "#APRS", "portable today"));
        adapter.on_message(&server, &dm("KB1ABC", "#APRS-RAW", "ignored"));

        let sent = modem.sent();
        assert_eq!(sent.len(), 2);
        match (&sent[0], &sent[1]) {
            (Packet::Aprs(chat), Packet::Aprs(status)) => {
                assert_eq!(chat.info, ":CQ       :anyone around");
                assert_eq!(status.data, AprsData::Status("portable today".into()));
            }
            other => panic!("Expected two APRS packets, got {:?}", other),
        }
    }
}
