//! Operator commands on `#CONTROL`

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ax25_ircd::{now_millis, ChatMessage, ConnectionKind, IrcServer, MessageListener};
use tracing::{info, warn};

use crate::adapter::CHANNEL_CONTROL;
use crate::error::CommandError;
use crate::state::{format_duration, GatewayState, MessageMode};

const MODE_USAGE: &str = "MODE [APRS|AX25]";

/// A parsed `#CONTROL` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// List commands
    Help,
    /// Gateway status and counters
    Status,
    /// Show, or set, the message mode
    Mode(Option<MessageMode>),
    /// List RF stations
    Clients,
    /// Close the chat transport
    Shutdown,
}

impl FromStr for ControlCommand {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_uppercase();
        let args: Vec<&str> = words.collect();
        match command.as_str() {
            "HELP" => Ok(ControlCommand::Help),
            "STATUS" => Ok(ControlCommand::Status),
            "CLIENTS" => Ok(ControlCommand::Clients),
            "SHUTDOWN" => Ok(ControlCommand::Shutdown),
            "MODE" => match args.as_slice() {
                [] => Ok(ControlCommand::Mode(None)),
                [mode] => Ok(ControlCommand::Mode(Some(mode.parse()?))),
                _ => Err(CommandError::Usage(MODE_USAGE)),
            },
            _ => Err(CommandError::Unknown(command)),
        }
    }
}

/// Executes operator commands and posts the output to `#CONTROL`
pub struct ControlPlane {
    state: Arc<GatewayState>,
    operators: Vec<String>,
}

impl ControlPlane {
    /// Create the control plane; an empty operator list admits every
    /// network client
    pub fn new(state: Arc<GatewayState>, operators: &[String]) -> Self {
        if operators.is_empty() {
            warn!("No operators configured, any chat user may issue {} commands", CHANNEL_CONTROL);
        }
        Self {
            state,
            operators: operators.iter().map(|o| o.to_ascii_lowercase()).collect(),
        }
    }

    /// Check whether the sender may issue commands
    pub fn is_authorized(&self, message: &ChatMessage) -> bool {
        message.sender_kind == ConnectionKind::Real
            && (self.operators.is_empty()
                || self.operators.contains(&message.sender.to_ascii_lowercase()))
    }

    /// Run a command, returning the output lines
    pub fn execute(&self, server: &IrcServer, command: ControlCommand) -> Vec<String> {
        match command {
            ControlCommand::Help => vec![
                "HELP - this list".into(),
                "STATUS - gateway status and traffic counters".into(),
                format!("{} - show or set the direct message mode", MODE_USAGE),
                "CLIENTS - list RF stations".into(),
                "SHUTDOWN - stop the gateway".into(),
            ],
            ControlCommand::Status => self.status(server),
            ControlCommand::Mode(None) => {
                vec![format!("message mode is {}", self.state.message_mode())]
            }
            ControlCommand::Mode(Some(mode)) => {
                let previous = self.state.set_message_mode(mode);
                info!("Message mode changed from {} to {}", previous, mode);
                vec![format!("message mode set to {} (was {})", mode, previous)]
            }
            ControlCommand::Clients => self.clients(server),
            ControlCommand::Shutdown => vec!["shutting down".into()],
        }
    }

    fn status(&self, server: &IrcServer) -> Vec<String> {
        let clients = server.clients();
        let stations = clients.iter().filter(|c| c.is_virtual()).count();
        let counters = self.state.counters();
        vec![
            format!(
                "message mode {}, radio {}, up {}",
                self.state.message_mode(),
                self.state.radio_mode(),
                format_duration(self.state.uptime())
            ),
            format!(
                "{} chat users, {} RF stations, last tick {} ms",
                clients.len() - stations,
                stations,
                self.state.last_tick_ms()
            ),
            format!(
                "rx {} chat, {} APRS, {} file, {} dropped; tx {} queued, {} failed",
                counters.received_chat,
                counters.received_aprs,
                counters.received_file,
                counters.dropped,
                counters.transmitted,
                counters.transmit_failed
            ),
        ]
    }

    fn clients(&self, server: &IrcServer) -> Vec<String> {
        let now = now_millis();
        let mut stations: Vec<_> = server.clients().into_iter().filter(|c| c.is_virtual()).collect();
        if stations.is_empty() {
            return vec!["no RF stations heard".into()];
        }
        stations.sort_by(|a, b| a.nick.cmp(&b.nick));
        stations
            .iter()
            .map(|c| {
                let idle = Duration::from_millis(now.saturating_sub(c.last_active));
                format!("{} idle {} in {}", c.nick, format_duration(idle), c.channels.join(" "))
            })
            .collect()
    }

    fn reply(server: &IrcServer, lines: &[String]) {
        let from = server.server_name();
        for line in lines {
            if let Err(e) = server.send_to_channel(&from, CHANNEL_CONTROL, line) {
                warn!("Failed to post to {}: {}", CHANNEL_CONTROL, e);
                return;
            }
        }
    }
}

impl MessageListener for ControlPlane {
    fn on_message(&self, server: &IrcServer, message: &ChatMessage) {
        if message.text.trim().is_empty() {
            return;
        }
        if !self.is_authorized(message) {
            warn!("Rejected control command from {}", message.sender);
            let error = CommandError::Unauthorized(message.sender.clone());
            Self::reply(server, &[format!("ERROR: {}", error)]);
            return;
        }

        let command = match message.text.parse::<ControlCommand>() {
            Ok(command) => command,
            Err(e) => {
                Self::reply(server, &[format!("ERROR: {}", e)]);
                return;
            }
        };
        info!("{} issued {:?}", message.sender, command);
        let output = self.execute(server, command);
        Self::reply(server, &output);

        if command == ControlCommand::Shutdown {
            server.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use ax25_ircd::{Channel, ClientId, ServerConfig};
    use ax25_modem::RadioMode;

    use super::*;

    fn setup(operators: &[&str]) -> (IrcServer, Arc<GatewayState>, ControlPlane) {
        let server = IrcServer::new(ServerConfig::default());
        server.add_channel(Channel::new(CHANNEL_CONTROL, "Gateway control", 0));
        let state = Arc::new(GatewayState::new(RadioMode::Kiss, 1000));
        let operators: Vec<String> = operators.iter().map(|s| s.to_string()).collect();
        let control = ControlPlane::new(state.clone(), &operators);
        (server, state, control)
    }

    fn message(sender: &str, kind: ConnectionKind, text: &str) -> ChatMessage {
        ChatMessage {
            sender: sender.into(),
            sender_id: ClientId(1),
            sender_kind: kind,
            target: CHANNEL_CONTROL.into(),
            text: text.into(),
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("help".parse(), Ok(ControlCommand::Help));
        assert_eq!(" Status ".parse(), Ok(ControlCommand::Status));
        assert_eq!("MODE".parse(), Ok(ControlCommand::Mode(None)));
        assert_eq!(
            "mode ax25".parse(),
            Ok(ControlCommand::Mode(Some(MessageMode::Ax25)))
        );
        assert_eq!(
            "MODE APRS AX25".parse::<ControlCommand>(),
            Err(CommandError::Usage(MODE_USAGE))
        );
        assert_eq!(
            "MODE VHF".parse::<ControlCommand>(),
            Err(CommandError::InvalidMode("VHF".into()))
        );
        assert_eq!(
            "reboot".parse::<ControlCommand>(),
            Err(CommandError::Unknown("REBOOT".into()))
        );
    }

    #[test]
    fn test_authorization() {
        let (_server, _state, open) = setup(&[]);
        assert!(open.is_authorized(&message("anyone", ConnectionKind::Real, "STATUS")));
        assert!(!open.is_authorized(&message("N0CALL", ConnectionKind::Virtual, "STATUS")));

        let (_server, _state, closed) = setup(&["Alice"]);
        assert!(closed.is_authorized(&message("alice", ConnectionKind::Real, "STATUS")));
        assert!(!closed.is_authorized(&message("bob", ConnectionKind::Real, "STATUS")));
    }

    #[test]
    fn test_mode_switch() {
        let (server, state, control) = setup(&[]);
        control.on_message(&server, &message("alice", ConnectionKind::Real, "MODE AX25"));
        assert_eq!(state.message_mode(), MessageMode::Ax25);

        let (server, state, control) = setup(&["carol"]);
        control.on_message(&server, &message("alice", ConnectionKind::Real, "MODE AX25"));
        assert_eq!(state.message_mode(), MessageMode::Aprs);
        control.on_message(&server, &message("carol", ConnectionKind::Virtual, "MODE AX25"));
        assert_eq!(state.message_mode(), MessageMode::Aprs);
    }

    #[test]
    fn test_status_and_clients_output() {
        let (server, state, control) = setup(&[]);
        state.record_tick(7);
        server.ensure_virtual_client("N0CALL", &[]).unwrap();

        let status = control.execute(&server, ControlCommand::Status);
        assert_eq!(status.len(), 3);
        assert!(status[0].starts_with("message mode APRS, radio KISS"));
        assert_eq!(status[1], "0 chat users, 1 RF stations, last tick 7 ms");

        let clients = control.execute(&server, ControlCommand::Clients);
        assert_eq!(clients.len(), 1);
        assert!(clients[0].starts_with("N0CALL idle "));
    }

    #[test]
    fn test_shutdown_closes_transport() {
        let (server, _state, control) = setup(&[]);
        control.on_message(&server, &message("alice", ConnectionKind::Real, "shutdown"));
        assert!(server.is_transport_closed());
    }
}
