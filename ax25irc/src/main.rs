//! ax25irc
//!
//! Runs the IRC server, the chosen modem backend and the gateway that
//! connects them until SHUTDOWN on `#CONTROL` or Ctrl-C.

mod cli;
mod settings;

use anyhow::{Context, Result};
use ax25_gateway::Gateway;
use ax25_ircd::IrcServer;
use ax25_modem::create_backend;
use clap::Parser;
use serialport::SerialPortType;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr: stdout carries KISS bytes in STDIN mode
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ax25irc=info,ax25_protocol=info,ax25_modem=info,ax25_ircd=info,ax25_gateway=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if cli.list_ports {
        return list_ports();
    }

    let settings = Settings::load(cli.config.as_deref())?.merge(&cli);
    info!("Starting ax25irc in {} mode", settings.mode);

    let modem = create_backend(settings.mode, settings.backend.as_deref())
        .with_context(|| format!("Failed to set up {} backend", settings.mode))?;

    let server = IrcServer::new(settings.server_config());
    let addr = server
        .bind(&settings.listen)
        .await
        .with_context(|| format!("Failed to listen on {}", settings.listen))?;
    info!("IRC server listening on {}", addr);

    let gateway = Gateway::new(server.clone(), modem, settings.gateway_config()?);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                server.close();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    gateway
        .scheduler()
        .run()
        .await
        .context("Gateway stopped with an error")?;
    info!("Goodbye");
    Ok(())
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        match port.port_type {
            SerialPortType::UsbPort(usb) => println!(
                "{}  USB {:04x}:{:04x} {}",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product.as_deref().unwrap_or("")
            ),
            _ => println!("{}", port.port_name),
        }
    }
    Ok(())
}
