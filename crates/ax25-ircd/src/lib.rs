//! Minimal IRC server for packet-radio gateways
//!
//! Network users connect over TCP as usual; RF stations are represented by
//! *virtual* clients the gateway creates and retires through the server API.
//! Only the command subset chat clients need to register, join channels and
//! exchange messages is implemented.
//!
//! # Architecture
//!
//! - One acceptor task plus a reader and a writer task per connection
//! - All registry state behind a single mutex, mutated in
//!   [`IrcServer::process_connections`] and the server-side API
//! - Channel, per-client and connection listeners invoked with the lock
//!   released, so they may call back into the server
//!
//! # Example
//!
//! ```rust,no_run
//! use ax25_ircd::{Channel, IrcServer, ServerConfig};
//!
//! # async fn run() -> Result<(), ax25_ircd::IrcError> {
//! let server = IrcServer::new(ServerConfig::default());
//! server.add_channel(Channel::new("#APRS", "Decoded APRS traffic", 43));
//! server.bind("0.0.0.0:6667").await?;
//!
//! while !server.is_transport_closed() {
//!     server.process_connections();
//!     tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub mod error;
pub mod listener;
pub mod message;
pub mod server;

pub use channel::{is_channel_name, Channel, ChannelInfo};
pub use client::{ClientId, ClientInfo, ConnectionKind};
pub use error::IrcError;
pub use listener::{ChatMessage, ClientConnectionListener, MessageListener};
pub use server::{now_millis, IrcServer, ServerConfig};
