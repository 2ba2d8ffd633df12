//! KISS over the process's own stdin/stdout

use std::sync::Arc;

use tracing::{info, warn};

use ax25_protocol::Packet;

use crate::error::ModemError;
use crate::link::{run_kiss_session, Outbound};
use crate::{ModemBackend, PacketListener};

/// Backend reading KISS from stdin and writing KISS to stdout
///
/// Logging must go to stderr while this backend is active.
#[derive(Default)]
pub struct StdinBackend {
    outbound: Outbound,
}

impl StdinBackend {
    /// Create the backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModemBackend for StdinBackend {
    fn name(&self) -> &str {
        "KISS stdin"
    }

    fn start(&self, listener: Arc<dyn PacketListener>) -> Result<(), ModemError> {
        let mut rx = self.outbound.open()?;
        info!("Reading KISS frames from stdin");
        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let stdout = tokio::io::stdout();
            run_kiss_session("stdin", stdin, stdout, &mut rx, listener.as_ref()).await;
            warn!("stdin ingestion stopped");
        });
        Ok(())
    }

    fn send(&self, packet: &Packet) -> Result<(), ModemError> {
        self.outbound.queue(packet)
    }
}
