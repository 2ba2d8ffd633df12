//! Shared gateway state

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use ax25_modem::RadioMode;
use ax25_protocol::PacketKind;
use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Default idle timeout for virtual clients
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 600_000;

/// Which adapter transmits chat-originated direct messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum MessageMode {
    /// APRS messages
    #[default]
    Aprs = 0,
    /// Plain AX.25 UI frames
    Ax25 = 1,
}

impl MessageMode {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => MessageMode::Ax25,
            _ => MessageMode::Aprs,
        }
    }
}

impl fmt::Display for MessageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageMode::Aprs => f.write_str("APRS"),
            MessageMode::Ax25 => f.write_str("AX25"),
        }
    }
}

impl FromStr for MessageMode {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APRS" => Ok(MessageMode::Aprs),
            "AX25" | "AX.25" => Ok(MessageMode::Ax25),
            _ => Err(CommandError::InvalidMode(s.trim().to_string())),
        }
    }
}

/// Traffic counters
#[derive(Debug, Default)]
struct Counters {
    received_chat: AtomicU64,
    received_aprs: AtomicU64,
    received_file: AtomicU64,
    dropped: AtomicU64,
    transmitted: AtomicU64,
    transmit_failed: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// AX.25 chat packets received
    pub received_chat: u64,
    /// APRS packets received
    pub received_aprs: u64,
    /// File transfer chunks received
    pub received_file: u64,
    /// Unroutable packets dropped
    pub dropped: u64,
    /// Packets queued for transmission
    pub transmitted: u64,
    /// Transmissions the backend refused
    pub transmit_failed: u64,
}

/// Gateway-wide state shared by the router, adapters, control plane and
/// scheduler
#[derive(Debug)]
pub struct GatewayState {
    message_mode: AtomicU8,
    radio_mode: RadioMode,
    idle_timeout_ms: u64,
    last_tick_ms: AtomicU64,
    started: Instant,
    counters: Counters,
}

impl GatewayState {
    /// Create state for a radio mode with the given idle timeout
    pub fn new(radio_mode: RadioMode, idle_timeout_ms: u64) -> Self {
        Self {
            message_mode: AtomicU8::new(MessageMode::default() as u8),
            radio_mode,
            idle_timeout_ms,
            last_tick_ms: AtomicU64::new(0),
            started: Instant::now(),
            counters: Counters::default(),
        }
    }

    /// Current message mode
    pub fn message_mode(&self) -> MessageMode {
        MessageMode::from_u8(self.message_mode.load(Ordering::SeqCst))
    }

    /// Switch the message mode, returning the previous one
    pub fn set_message_mode(&self, mode: MessageMode) -> MessageMode {
        MessageMode::from_u8(self.message_mode.swap(mode as u8, Ordering::SeqCst))
    }

    /// Configured radio mode
    pub fn radio_mode(&self) -> RadioMode {
        self.radio_mode
    }

    /// Idle timeout for virtual clients
    pub fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout_ms
    }

    /// Duration of the last scheduler tick
    pub fn last_tick_ms(&self) -> u64 {
        self.last_tick_ms.load(Ordering::Relaxed)
    }

    /// Record the duration of a scheduler tick
    pub fn record_tick(&self, elapsed_ms: u64) {
        self.last_tick_ms.store(elapsed_ms, Ordering::Relaxed);
    }

    /// Time since the gateway started
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Count an inbound packet
    pub fn record_received(&self, kind: PacketKind) {
        let counter = match kind {
            PacketKind::Chat => &self.counters.received_chat,
            PacketKind::Aprs => &self.counters.received_aprs,
            PacketKind::FileTransfer => &self.counters.received_file,
            PacketKind::Other => &self.counters.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a queued transmission
    pub fn record_transmitted(&self) {
        self.counters.transmitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a refused transmission
    pub fn record_transmit_failed(&self) {
        self.counters.transmit_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters
    pub fn counters(&self) -> CounterSnapshot {
        let c = &self.counters;
        CounterSnapshot {
            received_chat: c.received_chat.load(Ordering::Relaxed),
            received_aprs: c.received_aprs.load(Ordering::Relaxed),
            received_file: c.received_file.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            transmitted: c.transmitted.load(Ordering::Relaxed),
            transmit_failed: c.transmit_failed.load(Ordering::Relaxed),
        }
    }
}

/// Render a duration as `1d 2h 3m 4s`, dropping leading zero units
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (days, hours, mins, secs) = (secs / 86_400, secs / 3600 % 24, secs / 60 % 60, secs % 60);
    match (days, hours, mins) {
        (0, 0, 0) => format!("{}s", secs),
        (0, 0, _) => format!("{}m {}s", mins, secs),
        (0, _, _) => format!("{}h {}m {}s", hours, mins, secs),
        _ => format!("{}d {}h {}m {}s", days, hours, mins, secs),
    }
}
