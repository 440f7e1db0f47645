//! Server network loop: transport events in, game logic out.

use crate::config::ServerConfig;
use crate::game::GameServer;
use log::{debug, info};
use shared::{Result, TransportEvent, UdpEndpoint};
use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

const JOIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Main server coordinating the transport and the game session.
///
/// All session state lives in [`GameServer`] and is only touched from [`Server::run`],
/// one event at a time.
pub struct Server {
    endpoint: UdpEndpoint,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    game: GameServer,
    tick_duration: Duration,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let (endpoint, events) =
            UdpEndpoint::bind(&config.bind_address(), config.transport_config()).await?;
        info!(
            "Server up: {} players max, {} Hz tick",
            config.max_players, config.tick_rate
        );

        Ok(Server {
            endpoint,
            events,
            game: GameServer::new(&config),
            tick_duration: config.tick_duration(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// Runs until `shutdown` resolves, then disconnects everyone.
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut tick = interval(self.tick_duration);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut join_check = interval(JOIN_CHECK_INTERVAL);
        join_check.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = tick.tick() => {
                    self.game.tick();
                }
                _ = join_check.tick() => {
                    self.game.check_join_timeouts(Instant::now());
                }
                _ = &mut shutdown => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        self.game.shutdown();
        self.endpoint.shutdown(b"server shutting down");
        Ok(())
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(peer) => {
                self.game.handle_connected(peer, Instant::now());
            }
            TransportEvent::Received { peer, payload, .. } => {
                self.game.handle_payload(&peer, &payload, Instant::now());
            }
            TransportEvent::Disconnected { peer_id, reason } => {
                debug!("Connection {} closed: {:?}", peer_id, reason);
                self.game.handle_disconnected(peer_id);
            }
        }
    }
}
