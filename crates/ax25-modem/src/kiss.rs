//! KISS TNC backend over TCP or a serial port

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;
use tracing::{error, info, warn};

use ax25_protocol::Packet;

use crate::error::ModemError;
use crate::link::{run_kiss_session, Outbound, SessionEnd};
use crate::{ModemBackend, PacketListener};

/// Default KISS TCP endpoint (Direwolf, soundmodem and friends)
pub const DEFAULT_TCP_ADDR: &str = "127.0.0.1:8001";

/// Default serial baud rate for hardware TNCs
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Pause between TCP reconnect attempts
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Where the TNC is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KissTarget {
    /// KISS over TCP, `host:port`
    Tcp(String),
    /// KISS over a serial port
    Serial {
        /// Device path or COM port name
        path: String,
        /// Baud rate
        baud_rate: u32,
    },
}

impl KissTarget {
    /// Parse a backend string: `host:port` for TCP, `path[@baud]` for serial
    pub fn parse(spec: Option<&str>) -> Result<Self, ModemError> {
        let Some(spec) = spec.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(KissTarget::Tcp(DEFAULT_TCP_ADDR.to_string()));
        };

        if let Some((path, baud)) = spec.rsplit_once('@') {
            let baud_rate = baud
                .parse()
                .map_err(|_| ModemError::InvalidConfig(format!("bad baud rate {:?}", baud)))?;
            return Ok(KissTarget::Serial {
                path: path.to_string(),
                baud_rate,
            });
        }

        let looks_like_device = spec.starts_with('/') || spec.to_ascii_uppercase().starts_with("COM");
        match spec.rsplit_once(':') {
            Some((_, port)) if !looks_like_device => {
                port.parse::<u16>().map_err(|_| {
                    ModemError::InvalidConfig(format!("bad TCP port in {:?}", spec))
                })?;
                Ok(KissTarget::Tcp(spec.to_string()))
            }
            _ => Ok(KissTarget::Serial {
                path: spec.to_string(),
                baud_rate: DEFAULT_BAUD_RATE,
            }),
        }
    }
}

impl fmt::Display for KissTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KissTarget::Tcp(addr) => write!(f, "KISS TCP {}", addr),
            KissTarget::Serial { path, baud_rate } => {
                write!(f, "KISS serial {} @ {}", path, baud_rate)
            }
        }
    }
}

/// KISS TNC backend
pub struct KissBackend {
    target: KissTarget,
    name: String,
    outbound: Outbound,
}

impl KissBackend {
    /// Create a backend for the given target
    pub fn new(target: KissTarget) -> Self {
        Self {
            name: target.to_string(),
            target,
            outbound: Outbound::default(),
        }
    }
}

impl ModemBackend for KissBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, listener: Arc<dyn PacketListener>) -> Result<(), ModemError> {
        let mut rx = self.outbound.open()?;
        let name = self.name.clone();

        match &self.target {
            KissTarget::Serial { path, baud_rate } => {
                let stream = tokio_serial::new(path, *baud_rate)
                    .timeout(Duration::from_millis(100))
                    .open_native_async()?;
                info!("Opened {}", name);
                tokio::spawn(async move {
                    let (reader, writer) = tokio::io::split(stream);
                    run_kiss_session(&name, reader, writer, &mut rx, listener.as_ref()).await;
                    warn!("{} ingestion stopped", name);
                });
            }
            KissTarget::Tcp(addr) => {
                tokio::spawn(run_tcp(name, addr.clone(), rx, listener));
            }
        }
        Ok(())
    }

    fn send(&self, packet: &Packet) -> Result<(), ModemError> {
        self.outbound.queue(packet)
    }
}

/// Keep a TCP TNC session up, reconnecting after drops
async fn run_tcp(
    name: String,
    addr: String,
    mut rx: mpsc::Receiver<Vec<u8>>,
    listener: Arc<dyn PacketListener>,
) {
    loop {
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!("Connected to {}", name);
                let (reader, writer) = stream.into_split();
                if run_kiss_session(&name, reader, writer, &mut rx, listener.as_ref()).await
                    == SessionEnd::QueueClosed
                {
                    break;
                }
            }
            Err(e) => error!("Failed to connect to {}: {}", name, e),
        }
        warn!("Reconnecting to {} in {:?}", name, RECONNECT_DELAY);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
    info!("{} stopped", name);
}
