//! Gateway wiring

use std::sync::Arc;

use ax25_ircd::{
    Channel, ChatMessage, ClientConnectionListener, ClientId, ConnectionKind, IrcServer,
    MessageListener,
};
use ax25_modem::{ModemBackend, RadioMode};
use ax25_protocol::Address;
use tracing::{debug, info, warn};

use crate::adapter::{
    AprsAdapter, Ax25Adapter, ProtocolAdapter, Transmitter, CHANNEL_APRS, CHANNEL_APRS_CHAT,
    CHANNEL_AX25_CHAT, CHANNEL_CONTROL,
};
use crate::control::ControlPlane;
use crate::policy::should_forward_to_rf;
use crate::router::PacketRouter;
use crate::scheduler::GatewayScheduler;
use crate::state::{GatewayState, MessageMode, DEFAULT_IDLE_TIMEOUT_MS};

/// Default digipeater path for originated APRS packets
pub const DEFAULT_APRS_PATH: [&str; 2] = ["WIDE1-1", "WIDE2-1"];

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Radio mode, reported on STATUS
    pub radio_mode: RadioMode,
    /// Idle time after which RF stations are removed
    pub idle_timeout_ms: u64,
    /// Nicks allowed to use `#CONTROL`; empty admits everyone
    pub operators: Vec<String>,
    /// Digipeater path for originated APRS packets
    pub aprs_path: Vec<Address>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            radio_mode: RadioMode::default(),
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            operators: Vec::new(),
            aprs_path: DEFAULT_APRS_PATH
                .iter()
                .filter_map(|p| p.parse().ok())
                .collect(),
        }
    }
}

/// Sends network users' direct messages to RF stations over the air
struct DirectMessageRouter {
    state: Arc<GatewayState>,
    ax25: Arc<Ax25Adapter>,
    aprs: Arc<AprsAdapter>,
}

impl MessageListener for DirectMessageRouter {
    fn on_message(&self, server: &IrcServer, message: &ChatMessage) {
        let resolved = server.client(&message.target).map(|c| c.kind);
        if !should_forward_to_rf(&message.target, resolved) {
            return;
        }
        // The adapter follows the message mode, not the protocol the
        // target station was heard on.
        let mode = self.state.message_mode();
        debug!("Forwarding {} -> {} as {}", message.sender, message.target, mode);
        match mode {
            MessageMode::Aprs => self.aprs.send_direct(message),
            MessageMode::Ax25 => self.ax25.send_direct(message),
        }
    }
}

/// Attaches the direct message router to each network client
struct ClientRegistrar {
    direct: Arc<DirectMessageRouter>,
}

impl ClientConnectionListener for ClientRegistrar {
    fn on_client(&self, server: &IrcServer, client: ClientId) {
        let is_real = server
            .client_by_id(client)
            .is_some_and(|c| c.kind == ConnectionKind::Real);
        if !is_real {
            return;
        }
        if let Err(e) = server.add_client_listener(client, self.direct.clone()) {
            warn!("Failed to watch {}: {}", client, e);
        }
    }
}

/// The assembled gateway: adapters, router and control plane registered
/// on an IRC server, feeding one modem
pub struct Gateway {
    server: IrcServer,
    modem: Arc<dyn ModemBackend>,
    state: Arc<GatewayState>,
    router: Arc<PacketRouter>,
}

impl Gateway {
    /// Register channels and listeners on `server`
    pub fn new(server: IrcServer, modem: Arc<dyn ModemBackend>, config: GatewayConfig) -> Self {
        let state = Arc::new(GatewayState::new(config.radio_mode, config.idle_timeout_ms));
        let tx = Transmitter::new(modem.clone(), state.clone());
        let ax25 = Arc::new(Ax25Adapter::new(server.clone(), tx.clone()));
        let aprs = Arc::new(AprsAdapter::new(server.clone(), tx, config.aprs_path));

        for channel in ax25.channels().into_iter().chain(aprs.channels()) {
            server.add_channel(channel);
        }
        server.add_channel(Channel::new(
            CHANNEL_CONTROL,
            "Gateway control, say HELP",
            0,
        ));

        server.add_channel_listener(CHANNEL_AX25_CHAT, ax25.clone());
        server.add_channel_listener(CHANNEL_APRS_CHAT, aprs.clone());
        server.add_channel_listener(CHANNEL_APRS, aprs.clone());
        server.add_channel_listener(
            CHANNEL_CONTROL,
            Arc::new(ControlPlane::new(state.clone(), &config.operators)),
        );

        let direct = Arc::new(DirectMessageRouter {
            state: state.clone(),
            ax25: ax25.clone(),
            aprs: aprs.clone(),
        });
        server.add_connection_listener(Arc::new(ClientRegistrar { direct }));

        if !modem.can_transmit() {
            info!("{} is receive-only, chat will not be transmitted", modem.name());
        }

        let router = Arc::new(PacketRouter::new(ax25, aprs, state.clone()));
        Self {
            server,
            modem,
            state,
            router,
        }
    }

    /// The IRC server
    pub fn server(&self) -> &IrcServer {
        &self.server
    }

    /// Shared gateway state
    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    /// Router to hand to the modem
    pub fn router(&self) -> Arc<PacketRouter> {
        self.router.clone()
    }

    /// Build the scheduler that starts the modem and drives the server
    pub fn scheduler(&self) -> GatewayScheduler {
        GatewayScheduler::new(
            self.server.clone(),
            self.modem.clone(),
            self.router.clone(),
            self.state.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use ax25_ircd::ServerConfig;

    use super::*;
    use crate::adapter::test_support::RecordingModem;
    use crate::adapter::CHANNEL_APRS_RAW;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.idle_timeout_ms, 600_000);
        assert_eq!(config.radio_mode, RadioMode::Kiss);
        let path: Vec<String> = config.aprs_path.iter().map(|a| a.to_string()).collect();
        assert_eq!(path, vec!["WIDE1-1", "WIDE2-1"]);
    }

    #[test]
    fn test_channels_registered() {
        let server = IrcServer::new(ServerConfig::default());
        let _gateway = Gateway::new(
            server.clone(),
            Arc::new(RecordingModem::default()),
            GatewayConfig::default(),
        );

        let limits: Vec<(String, usize)> = [
            CHANNEL_APRS_RAW,
            CHANNEL_APRS,
            CHANNEL_APRS_CHAT,
            CHANNEL_AX25_CHAT,
            CHANNEL_CONTROL,
        ]
        .iter()
        .map(|name| {
            let info = server.channel(name).unwrap();
            (info.name, info.max_len)
        })
        .collect();
        assert_eq!(
            limits,
            vec![
                ("#APRS-RAW".to_string(), 0),
                ("#APRS".to_string(), 43),
                ("#APRS-CHAT".to_string(), 67),
                ("#AX25-CHAT".to_string(), 254),
                ("#CONTROL".to_string(), 0),
            ]
        );
    }
}
