//! Packet-radio modem backends
//!
//! This crate unifies four physically different packet sources/sinks behind
//! one [`ModemBackend`] contract:
//!
//! - **KISS**: a TNC reached over TCP or a serial port
//! - **SOUND**: an external sound-card modem speaking KISS on stdio
//! - **RTL_FM**: an RTL-SDR receiver via `rtl_fm | multimon-ng` (receive only)
//! - **STDIN**: a KISS byte stream on the process's stdin/stdout
//!
//! # Architecture
//!
//! `start` spawns the backend's background tokio tasks and returns
//! immediately. Every decoded frame is classified into a [`Packet`] and
//! handed to the [`PacketListener`] from the backend's single reader task,
//! so packets arrive in order. `send` encodes the packet and pushes it onto
//! a bounded queue ([`QUEUE_CAPACITY`]); it never waits.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ax25_modem::{create_backend, RadioMode};
//! use ax25_protocol::Packet;
//!
//! # async fn run() -> Result<(), ax25_modem::ModemError> {
//! let backend = create_backend(RadioMode::Kiss, Some("127.0.0.1:8001"))?;
//! backend.start(Arc::new(|packet: Packet| println!("{}", packet)))?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod kiss;
mod link;
pub mod mode;
pub mod rtl_fm;
pub mod sound;
pub mod stdin;

use std::sync::Arc;

use ax25_protocol::Packet;

pub use error::ModemError;
pub use kiss::{KissBackend, KissTarget};
pub use link::QUEUE_CAPACITY;
pub use mode::RadioMode;
pub use rtl_fm::RtlFmBackend;
pub use sound::SoundBackend;
pub use stdin::StdinBackend;

/// Receives packets from a backend's ingestion task
pub trait PacketListener: Send + Sync {
    /// Handle one inbound packet
    fn on_packet(&self, packet: Packet);
}

impl<F> PacketListener for F
where
    F: Fn(Packet) + Send + Sync,
{
    fn on_packet(&self, packet: Packet) {
        self(packet)
    }
}

/// Uniform contract over the modem backends
pub trait ModemBackend: Send + Sync {
    /// Human-readable backend description for logs
    fn name(&self) -> &str;

    /// Begin asynchronous ingestion
    ///
    /// Must be called from within a tokio runtime. Returns without waiting
    /// for traffic; a second call fails with [`ModemError::AlreadyStarted`].
    fn start(&self, listener: Arc<dyn PacketListener>) -> Result<(), ModemError>;

    /// Encode and queue one packet for transmission without blocking
    fn send(&self, packet: &Packet) -> Result<(), ModemError>;

    /// Whether `send` can ever succeed
    fn can_transmit(&self) -> bool {
        true
    }
}

/// Build the backend for a radio mode and its optional configuration string
pub fn create_backend(
    mode: RadioMode,
    extra: Option<&str>,
) -> Result<Arc<dyn ModemBackend>, ModemError> {
    let backend: Arc<dyn ModemBackend> = match mode {
        RadioMode::Kiss => Arc::new(KissBackend::new(KissTarget::parse(extra)?)),
        RadioMode::Sound => Arc::new(SoundBackend::new(extra)?),
        RadioMode::RtlFm => Arc::new(RtlFmBackend::new(extra)?),
        RadioMode::Stdin => Arc::new(StdinBackend::new()),
    };
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_backend_per_mode() {
        let kiss = create_backend(RadioMode::Kiss, None).unwrap();
        assert_eq!(kiss.name(), "KISS TCP 127.0.0.1:8001");
        assert!(kiss.can_transmit());

        let serial = create_backend(RadioMode::Kiss, Some("/dev/ttyACM0@1200")).unwrap();
        assert_eq!(serial.name(), "KISS serial /dev/ttyACM0 @ 1200");

        let rtl = create_backend(RadioMode::RtlFm, Some("145.825M")).unwrap();
        assert!(!rtl.can_transmit());

        assert!(create_backend(RadioMode::Sound, None).is_err());
        assert_eq!(
            create_backend(RadioMode::Stdin, None).unwrap().name(),
            "KISS stdin"
        );
    }
}
