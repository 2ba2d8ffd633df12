//! RTL-SDR receive-only backend
//!
//! Runs `rtl_fm` piped into `multimon-ng` and parses the TNC2 monitor lines
//! multimon-ng prints for every decoded AFSK1200 frame.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use ax25_protocol::{Frame, Packet};

use crate::error::ModemError;
use crate::{ModemBackend, PacketListener};

/// Default tuning frequency (North American APRS)
pub const DEFAULT_FREQUENCY: &str = "144.390M";

/// Prefixes multimon-ng puts in front of decoded frames
const MONITOR_PREFIXES: [&str; 2] = ["APRS: ", "AFSK1200: "];

/// Receive-only backend driving `rtl_fm | multimon-ng`
pub struct RtlFmBackend {
    frequency: String,
    name: String,
    started: AtomicBool,
}

impl RtlFmBackend {
    /// Create a backend tuned to `frequency` (default 144.390 MHz)
    pub fn new(frequency: Option<&str>) -> Result<Self, ModemError> {
        let frequency = frequency
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FREQUENCY);
        if !frequency
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.')
        {
            return Err(ModemError::InvalidConfig(format!(
                "bad frequency {:?}",
                frequency
            )));
        }
        Ok(Self {
            name: format!("rtl_fm {}", frequency),
            frequency: frequency.to_string(),
            started: AtomicBool::new(false),
        })
    }

    /// Shell pipeline run by the backend
    pub fn pipeline(&self) -> String {
        format!(
            "rtl_fm -f {} -s 22050 - | multimon-ng -t raw -a AFSK1200 -A -",
            self.frequency
        )
    }
}

/// Parse one multimon-ng output line into a packet
pub fn parse_monitor_line(line: &str) -> Option<Packet> {
    let line = line.trim();
    let line = MONITOR_PREFIXES
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
        .unwrap_or(line);
    if line.is_empty() {
        return None;
    }
    match Frame::from_tnc2(line) {
        Ok(frame) => Some(Packet::from_frame(frame)),
        Err(e) => {
            debug!("Dropping undecodable monitor line {:?}: {}", line, e);
            None
        }
    }
}

impl ModemBackend for RtlFmBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self, listener: Arc<dyn PacketListener>) -> Result<(), ModemError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ModemError::AlreadyStarted);
        }

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(self.pipeline())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        let Some(stdout) = child.stdout.take() else {
            return Err(ModemError::InvalidConfig("pipeline stdout not captured".into()));
        };
        info!("Started {} (pid {:?})", self.name, child.id());

        let name = self.name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(packet) = parse_monitor_line(&line) {
                            listener.on_packet(packet);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Read error on {}: {}", name, e);
                        break;
                    }
                }
            }
            match child.wait().await {
                Ok(status) => warn!("{} exited: {}", name, status),
                Err(e) => warn!("{} wait failed: {}", name, e),
            }
        });
        Ok(())
    }

    fn send(&self, _packet: &Packet) -> Result<(), ModemError> {
        Err(ModemError::ReceiveOnly)
    }

    fn can_transmit(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax25_protocol::{AprsData, PacketKind};

    #[test]
    fn test_parse_prefixed_line() {
        let packet = parse_monitor_line("APRS: N0CALL-9>APDR15,WIDE1-1:=4903.50N/07201.75W>\n")
            .unwrap();
        match packet {
            Packet::Aprs(p) => {
                assert_eq!(p.source.to_string(), "N0CALL-9");
                assert!(matches!(p.data, AprsData::Position { .. }));
            }
            other => panic!("Expected Aprs, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_plain_and_afsk_lines() {
        assert_eq!(
            parse_monitor_line("AFSK1200: N0CALL>CQ:hello").unwrap().kind(),
            PacketKind::Chat
        );
        assert_eq!(
            parse_monitor_line("N0CALL>APRS:>status").unwrap().kind(),
            PacketKind::Aprs
        );
    }

    #[test]
    fn test_noise_lines_dropped() {
        assert!(parse_monitor_line("").is_none());
        assert!(parse_monitor_line("multimon-ng 1.2.0").is_none());
        assert!(parse_monitor_line("Enabled demodulators: AFSK1200").is_none());
    }

    #[test]
    fn test_send_is_rejected() {
        let backend = RtlFmBackend::new(None).unwrap();
        assert!(backend.pipeline().contains("-f 144.390M"));
        let packet = parse_monitor_line("N0CALL>CQ:hi").unwrap();
        assert!(matches!(backend.send(&packet), Err(ModemError::ReceiveOnly)));
        assert!(!backend.can_transmit());
    }

    #[test]
    fn test_frequency_validated() {
        assert!(RtlFmBackend::new(Some("145.825M")).is_ok());
        assert!(RtlFmBackend::new(Some("144M; rm -rf /")).is_err());
    }
}
