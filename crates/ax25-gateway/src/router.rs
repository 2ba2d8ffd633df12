//! Inbound packet routing

use std::sync::Arc;

use ax25_modem::PacketListener;
use ax25_protocol::Packet;
use tracing::{trace, warn};

use crate::adapter::ProtocolAdapter;
use crate::state::GatewayState;

/// Dispatches packets from the modem to the adapter for their kind
///
/// Chat and file transfer packets go to the AX.25 adapter, APRS to the APRS
/// adapter. Anything else is logged and dropped.
pub struct PacketRouter {
    ax25: Arc<dyn ProtocolAdapter>,
    aprs: Arc<dyn ProtocolAdapter>,
    state: Arc<GatewayState>,
}

impl PacketRouter {
    /// Create a router over the two adapters
    pub fn new(
        ax25: Arc<dyn ProtocolAdapter>,
        aprs: Arc<dyn ProtocolAdapter>,
        state: Arc<GatewayState>,
    ) -> Self {
        Self { ax25, aprs, state }
    }

    /// Route one packet
    pub fn route(&self, packet: Packet) {
        self.state.record_received(packet.kind());
        trace!("Routing {} packet from {}: {}", packet.kind(), packet.source(), packet);
        match packet {
            Packet::Chat(_) | Packet::FileTransfer(_) => self.ax25.on_packet(packet),
            Packet::Aprs(_) => self.aprs.on_packet(packet),
            Packet::Other(frame) => {
                warn!("Dropping unroutable frame from {}: {}", frame.source, frame);
            }
        }
    }
}

impl PacketListener for PacketRouter {
    fn on_packet(&self, packet: Packet) {
        self.route(packet);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use ax25_ircd::{Channel, ChatMessage};
    use ax25_modem::RadioMode;
    use ax25_protocol::{Frame, PacketKind};

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PacketKind>>);

    impl ProtocolAdapter for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn channels(&self) -> Vec<Channel> {
            Vec::new()
        }

        fn on_packet(&self, packet: Packet) {
            self.0.lock().unwrap().push(packet.kind());
        }

        fn send_direct(&self, _message: &ChatMessage) {}
    }

    fn packet(tnc2: &str) -> Packet {
        Packet::from_frame(Frame::from_tnc2(tnc2).unwrap())
    }

    #[test]
    fn test_dispatch_by_kind() {
        let ax25 = Arc::new(Recorder::default());
        let aprs = Arc::new(Recorder::default());
        let state = Arc::new(GatewayState::new(RadioMode::Kiss, 1000));
        let router = PacketRouter::new(ax25.clone(), aprs.clone(), state.clone());

        router.route(packet("N0CALL>CQ:hello"));
        router.route(packet("N0CALL>APRS:>status"));
        router.route(packet("N0CALL>KB1ABC:#FILE:a.txt:0:1:x"));

        let mut other = Frame::from_tnc2("N0CALL>KB1ABC:data").unwrap();
        other.control = 0x00;
        router.route(Packet::from_frame(other));

        assert_eq!(
            *ax25.0.lock().unwrap(),
            vec![PacketKind::Chat, PacketKind::FileTransfer]
        );
        assert_eq!(*aprs.0.lock().unwrap(), vec![PacketKind::Aprs]);

        let counters = state.counters();
        assert_eq!(counters.received_chat, 1);
        assert_eq!(counters.received_aprs, 1);
        assert_eq!(counters.received_file, 1);
        assert_eq!(counters.dropped, 1);
    }
}
