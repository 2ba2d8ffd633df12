//! Sound-card modem backend
//!
//! Demodulation is left to an external program (for example
//! `direwolf -t 0 -p -` style setups) that speaks KISS on its stdin and
//! stdout. The program is run through `sh -c` and killed with the gateway.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{info, warn};

use ax25_protocol::Packet;

use crate::error::ModemError;
use crate::link::{run_kiss_session, Outbound};
use crate::{ModemBackend, PacketListener};

/// Backend driving an external KISS sound modem
pub struct SoundBackend {
    command: String,
    name: String,
    outbound: Outbound,
}

impl SoundBackend {
    /// Create a backend for the given modem command line
    pub fn new(command: Option<&str>) -> Result<Self, ModemError> {
        let command = command
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ModemError::InvalidConfig("sound mode needs a modem command line".into())
            })?;
        Ok(Self {
            name: format!("sound modem `{}`", command),
            command: command.to_string(),
            outbound: Outbound::default(),
        })
    }
}

impl ModemBackend for SoundBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, listener: Arc<dyn PacketListener>) -> Result<(), ModemError> {
        let mut rx = self.outbound.open()?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
            return Err(ModemError::InvalidConfig("modem stdio not captured".into()));
        };
        info!("Started {} (pid {:?})", self.name, child.id());

        let name = self.name.clone();
        tokio::spawn(async move {
            run_kiss_session(&name, stdout, stdin, &mut rx, listener.as_ref()).await;
            match child.wait().await {
                Ok(status) => warn!("{} exited: {}", name, status),
                Err(e) => warn!("{} wait failed: {}", name, e),
            }
        });
        Ok(())
    }

    fn send(&self, packet: &Packet) -> Result<(), ModemError> {
        self.outbound.queue(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax25_protocol::{Frame, PacketKind};
    use tokio::sync::mpsc;

    #[test]
    fn test_command_required() {
        assert!(matches!(
            SoundBackend::new(None),
            Err(ModemError::InvalidConfig(_))
        ));
        assert!(SoundBackend::new(Some("  ")).is_err());
        assert_eq!(
            SoundBackend::new(Some(" cat ")).unwrap().name(),
            "sound modem `cat`"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_loopback_through_cat() {
        // `cat` echoes every transmitted KISS frame straight back
        let backend = SoundBackend::new(Some("cat")).unwrap();
        let (tx, mut packets) = mpsc::unbounded_channel();
        backend
            .start(Arc::new(move |packet: Packet| {
                let _ = tx.send(packet);
            }))
            .unwrap();

        let packet = Packet::from_frame(Frame::from_tnc2("N0CALL>CQ:echo").unwrap());
        backend.send(&packet).unwrap();

        let echoed = tokio::time::timeout(std::time::Duration::from_secs(5), packets.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echoed.kind(), PacketKind::Chat);
        assert_eq!(echoed, packet);
    }
}
