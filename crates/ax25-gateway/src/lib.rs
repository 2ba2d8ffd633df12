//! AX.25/APRS ↔ IRC gateway core
//!
//! Packets heard by a modem backend are routed to a protocol adapter, which
//! presents each RF station as a virtual IRC client posting into the
//! gateway's channels. In the other direction, network users' messages are
//! turned into AX.25 or APRS packets and handed to the modem.
//!
//! | Channel       | Carries                                   | Limit |
//! |---------------|-------------------------------------------|-------|
//! | `#APRS-RAW`   | every APRS packet in TNC2 form            | none  |
//! | `#APRS`       | decoded APRS summaries                    | 43    |
//! | `#APRS-CHAT`  | APRS messages not for a chat user         | 67    |
//! | `#AX25-CHAT`  | plain AX.25 chat                          | 254   |
//! | `#CONTROL`    | operator commands                         | none  |
//!
//! # Example
//!
//! ```no_run
//! use ax25_gateway::{Gateway, GatewayConfig};
//! use ax25_ircd::{IrcServer, ServerConfig};
//! use ax25_modem::{create_backend, RadioMode};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = IrcServer::new(ServerConfig::default());
//! server.bind("0.0.0.0:6667").await?;
//!
//! let modem = create_backend(RadioMode::Kiss, Some("127.0.0.1:8001"))?;
//! let gateway = Gateway::new(server, modem, GatewayConfig::default());
//! gateway.scheduler().run().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod control;
pub mod error;
pub mod gateway;
pub mod policy;
pub mod router;
pub mod scheduler;
pub mod state;

pub use adapter::{
    truncate_chars, AprsAdapter, Ax25Adapter, ProtocolAdapter, APRS_TOCALL, CHANNEL_APRS,
    CHANNEL_APRS_CHAT, CHANNEL_APRS_RAW, CHANNEL_AX25_CHAT, CHANNEL_CONTROL,
};
pub use control::{ControlCommand, ControlPlane};
pub use error::{CommandError, GatewayError};
pub use gateway::{Gateway, GatewayConfig, DEFAULT_APRS_PATH};
pub use policy::should_forward_to_rf;
pub use router::PacketRouter;
pub use scheduler::{
    evict_idle, is_idle, tick_sleep, GatewayScheduler, SchedulerState, IDLE_QUIT_REASON,
    MIN_TICK_SLEEP, TICK_PERIOD,
};
pub use state::{CounterSnapshot, GatewayState, MessageMode, DEFAULT_IDLE_TIMEOUT_MS};
