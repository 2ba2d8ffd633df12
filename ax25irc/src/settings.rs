//! Persistent settings
//!
//! Settings come from an optional JSON file; command line values override
//! them and anything missing takes its default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ax25_gateway::{GatewayConfig, DEFAULT_APRS_PATH, DEFAULT_IDLE_TIMEOUT_MS};
use ax25_ircd::ServerConfig;
use ax25_modem::RadioMode;
use ax25_protocol::Address;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Default IRC listen address
pub const DEFAULT_LISTEN: &str = "0.0.0.0:6667";

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Radio mode
    pub mode: RadioMode,
    /// Backend configuration string for the mode
    pub backend: Option<String>,
    /// IRC listen address
    pub listen: String,
    /// Idle timeout for RF stations
    pub idle_timeout_ms: u64,
    /// Nicks allowed to use `#CONTROL`
    pub operators: Vec<String>,
    /// Digipeater path for originated APRS packets
    pub aprs_path: Vec<String>,
    /// IRC server name
    pub server_name: String,
    /// Message of the day
    pub motd: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            mode: RadioMode::default(),
            backend: None,
            listen: DEFAULT_LISTEN.to_string(),
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            operators: Vec::new(),
            aprs_path: DEFAULT_APRS_PATH.iter().map(|p| p.to_string()).collect(),
            server_name: server.name,
            motd: server.motd,
        }
    }
}

impl Settings {
    /// Get the XDG config directory for ax25irc
    /// Uses $XDG_CONFIG_HOME/ax25irc, falls back to ~/.config/ax25irc
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("ax25irc"));
            }
        }
        dirs::home_dir().map(|h| h.join(".config").join("ax25irc"))
    }

    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings
    ///
    /// An explicit path must exist and parse. Without one, the default file
    /// is used if present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    /// Apply command line overrides
    pub fn merge(mut self, cli: &Cli) -> Self {
        if let Some(mode) = cli.mode {
            self.mode = mode;
            // A backend string belongs to the mode it was written for
            self.backend = cli.backend.clone();
        } else if cli.backend.is_some() {
            self.backend = cli.backend.clone();
        }
        if let Some(listen) = &cli.listen {
            self.listen = listen.clone();
        }
        if let Some(timeout) = cli.idle_timeout_ms {
            self.idle_timeout_ms = timeout;
        }
        if !cli.operators.is_empty() {
            self.operators = cli.operators.clone();
        }
        if !cli.aprs_path.is_empty() {
            self.aprs_path = cli.aprs_path.clone();
        }
        self
    }

    /// IRC server configuration
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            name: self.server_name.clone(),
            motd: self.motd.clone(),
        }
    }

    /// Gateway configuration
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let aprs_path = self
            .aprs_path
            .iter()
            .map(|p| {
                p.parse::<Address>()
                    .with_context(|| format!("Invalid APRS path entry {:?}", p))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GatewayConfig {
            radio_mode: self.mode,
            idle_timeout_ms: self.idle_timeout_ms,
            operators: self.operators.clone(),
            aprs_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.listen, "0.0.0.0:6667");
        assert_eq!(settings.idle_timeout_ms, 600_000);
        assert_eq!(settings.mode, RadioMode::Kiss);
        assert_eq!(settings.aprs_path, vec!["WIDE1-1", "WIDE2-1"]);
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "mode": "rtlfm", "operators": ["alice"] }"#).unwrap();
        assert_eq!(settings.mode, RadioMode::RtlFm);
        assert_eq!(settings.operators, vec!["alice"]);
        assert_eq!(settings.listen, DEFAULT_LISTEN);
        assert_eq!(settings.server_name, "ax25irc");
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = Settings {
            mode: RadioMode::Sound,
            backend: Some("direwolf -p".into()),
            operators: vec!["carol".into()],
            ..Default::default()
        };
        let cli = Cli::parse_from(["ax25irc", "--listen", "127.0.0.1:7000", "--operator", "dave"]);
        let merged = file.clone().merge(&cli);
        assert_eq!(merged.mode, RadioMode::Sound);
        assert_eq!(merged.backend.as_deref(), Some("direwolf -p"));
        assert_eq!(merged.listen, "127.0.0.1:7000");
        assert_eq!(merged.operators, vec!["dave"]);

        let cli = Cli::parse_from(["ax25irc", "stdin"]);
        let merged = file.merge(&cli);
        assert_eq!(merged.mode, RadioMode::Stdin);
        assert_eq!(merged.backend, None);
    }

    #[test]
    fn test_gateway_config() {
        let settings = Settings {
            aprs_path: vec!["WIDE2-2".into()],
            ..Default::default()
        };
        let config = settings.gateway_config().unwrap();
        assert_eq!(config.aprs_path.len(), 1);
        assert_eq!(config.aprs_path[0].ssid, 2);

        let bad = Settings {
            aprs_path: vec!["NOT A CALL".into()],
            ..Default::default()
        };
        assert!(bad.gateway_config().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let missing = Path::new("/nonexistent/ax25irc/settings.json");
        assert!(Settings::load(Some(missing)).is_err());
    }
}
