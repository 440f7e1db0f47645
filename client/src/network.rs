use crate::game::{ClientWorld, WorldEvent};
use crate::input::InputSource;
use log::{debug, info, warn};
use shared::packets::Join;
use shared::transport::DirectPeer;
use shared::{
    send_packet, DisconnectReason, NetError, Packet, Peer, Result, TransportConfig,
    TransportEvent, UdpEndpoint,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Give up if the server has not answered `Join` within this long.
    pub join_timeout: Duration,
    /// Own-state updates pushed per second.
    pub send_rate: u32,
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(10),
            send_rate: 20,
            transport: TransportConfig::default(),
        }
    }
}

/// A joined player session.
#[derive(Debug)]
pub struct Client {
    _endpoint: UdpEndpoint,
    peer: Arc<DirectPeer>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    world: ClientWorld,
    config: ClientConfig,
}

impl Client {
    /// Connects to `server` and completes the join handshake.
    pub async fn join(server: &str, username: &str, config: ClientConfig) -> Result<Self> {
        info!("Connecting to {}", server);
        let (endpoint, peer, mut events) =
            UdpEndpoint::connect(server, config.transport.clone()).await?;

        let join = Packet::Join(Join {
            username: username.to_string(),
        });
        send_packet(&*peer, &join)?;

        let deadline = Instant::now() + config.join_timeout;
        let world = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match timeout(remaining, events.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) => return Err(NetError::PeerUnreachable { peer: peer.id() }),
                Err(_) => {
                    peer.disconnect(Some(b"join timeout"));
                    return Err(NetError::JoinTimeout);
                }
            };

            match event {
                TransportEvent::Received { payload, .. } => match Packet::from_bytes(&payload) {
                    Ok(Packet::JoinAccept(accept)) => break ClientWorld::from_accept(accept),
                    Ok(Packet::JoinRejected(rejected)) => {
                        return Err(NetError::JoinRejected(rejected.reason))
                    }
                    Ok(other) => debug!("Ignoring {:?} while joining", other.kind()),
                    Err(e) => warn!("Malformed packet while joining: {}", e),
                },
                TransportEvent::Disconnected { reason, .. } => {
                    return Err(match reason {
                        DisconnectReason::Remote(reason) => {
                            NetError::JoinRejected(String::from_utf8_lossy(&reason).into_owned())
                        }
                        _ => NetError::PeerUnreachable { peer: peer.id() },
                    });
                }
                TransportEvent::Connected(_) => {}
            }
        };

        info!(
            "Joined as player {} with {} other player(s)",
            world.pid(),
            world.player_count() - 1
        );
        Ok(Client {
            _endpoint: endpoint,
            peer,
            events,
            world,
            config,
        })
    }

    pub fn world(&self) -> &ClientWorld {
        &self.world
    }

    pub fn pid(&self) -> u32 {
        self.world.pid()
    }

    pub fn is_connected(&self) -> bool {
        self.peer.is_connected()
    }

    pub fn ping(&self) -> u32 {
        self.peer.ping()
    }

    /// Moves the local player and reports the new state to the server.
    pub fn push_update(&mut self, input: &mut InputSource, dt: f32) -> Result<()> {
        let velocity = input.next_velocity(dt, self.world.local().max_run_speed);
        self.world.step_local(velocity, dt);
        let update = Packet::PlayerSendUpdate(self.world.local_update(dt));
        send_packet(&*self.peer, &update)
    }

    /// Waits up to `wait` for the next server packet and applies it.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    pub async fn next_event(&mut self, wait: Duration) -> Result<Option<WorldEvent>> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match timeout(remaining, self.events.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => return Ok(None),
            };
            if let Some(world_event) = self.handle_event(event)? {
                return Ok(Some(world_event));
            }
        }
    }

    fn handle_event(&mut self, event: TransportEvent) -> Result<Option<WorldEvent>> {
        match event {
            TransportEvent::Received { payload, .. } => match Packet::from_bytes(&payload) {
                Ok(packet) => Ok(Some(self.world.apply(packet))),
                Err(e) => {
                    warn!("Dropping malformed packet from server: {}", e);
                    Ok(None)
                }
            },
            TransportEvent::Disconnected { reason, .. } => {
                warn!("Disconnected from server: {:?}", reason);
                Err(NetError::PeerUnreachable {
                    peer: self.peer.id(),
                })
            }
            TransportEvent::Connected(_) => Ok(None),
        }
    }

    /// Pushes updates at the configured rate until `shutdown` resolves or the
    /// server goes away.
    pub async fn run<F>(&mut self, mut input: InputSource, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let period = Duration::from_nanos(1_000_000_000 / self.config.send_rate.max(1) as u64);
        let mut send_interval = interval(period);
        send_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_send = Instant::now();
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        break Ok(());
                    };
                    match self.handle_event(event) {
                        Ok(Some(WorldEvent::PlayerJoined { pid, username })) => {
                            info!(
                                "{} players online ({} joined as {})",
                                self.world.player_count(),
                                username,
                                pid
                            );
                        }
                        Ok(Some(WorldEvent::PlayerLeft { .. })) => {
                            info!("{} players online", self.world.player_count());
                        }
                        Ok(_) => {}
                        Err(e) => break Err(e),
                    }
                }
                _ = send_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_send).as_secs_f32();
                    last_send = now;
                    if let Err(e) = self.push_update(&mut input, dt) {
                        break Err(e);
                    }
                }
                _ = &mut shutdown => break Ok(()),
            }
        };

        self.disconnect();
        result
    }

    pub fn disconnect(&self) {
        self.peer.disconnect(Some(b"client quit"));
    }
}
