//! Gateway main loop
//!
//! One tick removes RF stations that have been quiet longer than the idle
//! timeout, then applies pending chat connection events. Ticks aim
//! for a fixed period; a slow tick still sleeps a minimum so the loop never
//! spins. Closing the chat transport ends the loop, including mid-sleep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ax25_ircd::{now_millis, ClientId, ClientInfo, IrcServer};
use ax25_modem::ModemBackend;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::router::PacketRouter;
use crate::state::GatewayState;

/// Target tick period
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Shortest sleep between ticks
pub const MIN_TICK_SLEEP: Duration = Duration::from_millis(10);

/// Reason given to channel peers when an idle station is removed
pub const IDLE_QUIT_REASON: &str = "idle time exceeded";

/// Lifecycle of a [`GatewayScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Built, not yet run
    Configured,
    /// Ticking
    Running,
    /// Transport closed, loop ended
    Stopped,
}

/// Sleep after a tick that took `elapsed`
pub fn tick_sleep(elapsed: Duration) -> Duration {
    TICK_PERIOD.saturating_sub(elapsed).max(MIN_TICK_SLEEP)
}

/// Check whether a station last active at `last_active_ms` is idle at
/// `now_ms`. A zero activity time means never active and is never idle.
pub fn is_idle(last_active_ms: u64, now_ms: u64, timeout_ms: u64) -> bool {
    last_active_ms > 0 && now_ms.saturating_sub(last_active_ms) >= timeout_ms
}

/// Remove idle virtual clients, returning the evicted clients
///
/// Idleness is checked again at removal, so a station heard since the scan
/// stays.
pub fn evict_idle(server: &IrcServer, now_ms: u64, timeout_ms: u64) -> Vec<ClientInfo> {
    let idle = |c: &ClientInfo| c.is_virtual() && is_idle(c.last_active, now_ms, timeout_ms);
    let candidates: Vec<ClientId> = server
        .clients()
        .iter()
        .filter(|&c| idle(c))
        .map(|c| c.id)
        .collect();

    let mut evicted = Vec::with_capacity(candidates.len());
    for id in candidates {
        let Some(client) = server.remove_client_if(id, IDLE_QUIT_REASON, idle) else {
            debug!("{} became active before eviction", id);
            continue;
        };
        info!(
            "Removed idle station {} after {} ms",
            client.nick,
            now_ms.saturating_sub(client.last_active)
        );
        evicted.push(client);
    }
    evicted
}

/// Starts ingestion and drives the server until the transport closes
pub struct GatewayScheduler {
    server: IrcServer,
    modem: Arc<dyn ModemBackend>,
    router: Arc<PacketRouter>,
    state: Arc<GatewayState>,
    status: SchedulerState,
}

impl GatewayScheduler {
    pub(crate) fn new(
        server: IrcServer,
        modem: Arc<dyn ModemBackend>,
        router: Arc<PacketRouter>,
        state: Arc<GatewayState>,
    ) -> Self {
        Self {
            server,
            modem,
            router,
            state,
            status: SchedulerState::Configured,
        }
    }

    /// Current lifecycle state
    pub fn status(&self) -> SchedulerState {
        self.status
    }

    /// Run one tick, returning how long it took
    pub fn tick(&self) -> Duration {
        let start = Instant::now();
        let evicted = evict_idle(&self.server, now_millis(), self.state.idle_timeout_ms());
        let events = self.server.process_connections();
        let elapsed = start.elapsed();
        if events > 0 || !evicted.is_empty() {
            debug!(
                "Tick handled {} events, evicted {} stations in {:?}",
                events,
                evicted.len(),
                elapsed
            );
        }
        self.state.record_tick(elapsed.as_millis() as u64);
        elapsed
    }

    /// Start the modem and tick until the chat transport closes
    pub async fn run(&mut self) -> Result<(), GatewayError> {
        if self.status != SchedulerState::Configured {
            return Err(GatewayError::AlreadyRunning);
        }
        if let Err(e) = self.modem.start(self.router.clone()) {
            self.status = SchedulerState::Stopped;
            return Err(e.into());
        }
        self.status = SchedulerState::Running;
        info!("Gateway running on {}", self.modem.name());

        while !self.server.is_transport_closed() {
            let elapsed = self.tick();
            tokio::select! {
                _ = tokio::time::sleep(tick_sleep(elapsed)) => {}
                _ = self.server.closed() => {
                    warn!("Tick sleep interrupted, transport closed");
                }
            }
        }

        self.status = SchedulerState::Stopped;
        info!("Gateway stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ax25_ircd::ServerConfig;
    use ax25_modem::ModemError;

    use super::*;
    use crate::adapter::test_support::RecordingModem;
    use crate::gateway::{Gateway, GatewayConfig};

    #[test]
    fn test_tick_sleep() {
        assert_eq!(tick_sleep(Duration::ZERO), TICK_PERIOD);
        assert_eq!(tick_sleep(Duration::from_millis(30)), Duration::from_millis(70));
        assert_eq!(tick_sleep(Duration::from_millis(95)), MIN_TICK_SLEEP);
        assert_eq!(tick_sleep(Duration::from_secs(3)), MIN_TICK_SLEEP);
    }

    #[test]
    fn test_is_idle() {
        assert!(!is_idle(0, 10_000_000, 1000));
        assert!(!is_idle(5000, 5999, 1000));
        assert!(is_idle(5000, 6000, 1000));
        assert!(!is_idle(5000, 4000, 1000));
    }

    #[test]
    fn test_evict_idle_virtual_only() {
        let server = IrcServer::new(ServerConfig::default());
        let quiet = server.ensure_virtual_client("N0CALL", &[]).unwrap();
        let busy = server.ensure_virtual_client("KB1ABC", &[]).unwrap();
        let fresh = server.ensure_virtual_client("W1AW", &[]).unwrap();
        server.set_last_active(quiet, 1_000).unwrap();
        server.set_last_active(busy, 9_500).unwrap();
        server.set_last_active(fresh, 0).unwrap();

        let evicted = evict_idle(&server, 10_000, 5_000);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].nick, "N0CALL");
        assert!(server.client("N0CALL").is_none());
        assert!(server.client("KB1ABC").is_some());
        assert!(server.client("W1AW").is_some());
    }

    #[tokio::test]
    async fn test_run_until_closed() {
        let server = IrcServer::new(ServerConfig::default());
        let gateway = Gateway::new(
            server.clone(),
            Arc::new(RecordingModem::default()),
            GatewayConfig::default(),
        );
        let mut scheduler = gateway.scheduler();
        assert_eq!(scheduler.status(), SchedulerState::Configured);

        let closer = server.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            closer.close();
        });

        tokio::time::timeout(Duration::from_secs(2), scheduler.run())
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert_eq!(scheduler.status(), SchedulerState::Stopped);
        assert!(matches!(
            scheduler.run().await,
            Err(GatewayError::AlreadyRunning)
        ));
    }

    struct BrokenModem;

    impl ModemBackend for BrokenModem {
        fn name(&self) -> &str {
            "broken"
        }

        fn start(&self, _listener: Arc<dyn ax25_modem::PacketListener>) -> Result<(), ModemError> {
            Err(ModemError::InvalidConfig("no device".into()))
        }

        fn send(&self, _packet: &ax25_protocol::Packet) -> Result<(), ModemError> {
            Err(ModemError::NotStarted)
        }
    }

    #[tokio::test]
    async fn test_modem_start_failure() {
        let server = IrcServer::new(ServerConfig::default());
        let gateway = Gateway::new(server, Arc::new(BrokenModem), GatewayConfig::default());
        let mut scheduler = gateway.scheduler();
        assert!(matches!(
            scheduler.run().await,
            Err(GatewayError::Modem(ModemError::InvalidConfig(_)))
        ));
        assert_eq!(scheduler.status(), SchedulerState::Stopped);
    }
}
