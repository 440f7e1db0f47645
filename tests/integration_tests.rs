//! Integration tests for networked multiplayer components
//!
//! These tests run a real server, relay and clients over loopback UDP.

use assert_approx_eq::assert_approx_eq;
use client::game::WorldEvent;
use client::input::{InputSource, Wanderer};
use client::network::{Client, ClientConfig};
use server::config::ServerConfig;
use server::network::Server;
use server::relay::RelayNode;
use shared::{
    DeliveryMethod, DisconnectReason, NetError, Peer, TransportConfig, TransportEvent,
    UdpEndpoint,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::{assert_err, assert_ok};

const WAIT: Duration = Duration::from_secs(5);

struct RunningServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RunningServer {
    async fn start(max_players: u32) -> Self {
        let config = ServerConfig {
            port: 0,
            max_players,
            tick_rate: 60,
            ..ServerConfig::default()
        };
        let server = Server::new(config).await.expect("server failed to start");
        let addr = server.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            server
                .run(async {
                    let _ = stopped.await;
                })
                .await
                .unwrap();
        });
        Self {
            addr,
            stop: Some(stop),
            handle,
        }
    }

    fn address(&self) -> String {
        self.addr.to_string()
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = timeout(WAIT, &mut self.handle).await;
    }
}

fn client_config() -> ClientConfig {
    ClientConfig {
        join_timeout: Duration::from_secs(3),
        ..ClientConfig::default()
    }
}

/// Reads events until `matches` accepts one or the wait runs out.
async fn wait_for<F>(client: &mut Client, mut matches: F) -> bool
where
    F: FnMut(&WorldEvent, &Client) -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        match client.next_event(Duration::from_millis(200)).await {
            Ok(Some(event)) => {
                if matches(&event, client) {
                    return true;
                }
            }
            Ok(None) => {}
            Err(_) => return false,
        }
    }
    false
}

/// SESSION LIFECYCLE TESTS
mod session_tests {
    use super::*;

    #[tokio::test]
    async fn two_clients_see_each_other() {
        let server = RunningServer::start(4).await;

        let mut ana = Client::join(&server.address(), "Ana", client_config()).await.unwrap();
        assert_eq!(ana.pid(), 0);
        assert_eq!(ana.world().player_count(), 1);
        assert_eq!(ana.world().local().username, "Ana");

        let bo = Client::join(&server.address(), "Bo", client_config()).await.unwrap();
        assert_eq!(bo.pid(), 1);
        assert_eq!(bo.world().other(0).unwrap().username, "Ana");

        assert!(
            wait_for(&mut ana, |event, _| matches!(
                event,
                WorldEvent::PlayerJoined { pid: 1, username } if username == "Bo"
            ))
            .await
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn full_server_rejects_then_reuses_lowest_pid() {
        let server = RunningServer::start(2).await;

        let first = assert_ok!(Client::join(&server.address(), "a", client_config()).await);
        let mut second = assert_ok!(Client::join(&server.address(), "b", client_config()).await);
        assert_eq!((first.pid(), second.pid()), (0, 1));

        let rejected = Client::join(&server.address(), "c", client_config()).await;
        assert!(matches!(assert_err!(rejected), NetError::JoinRejected(_)));

        first.disconnect();
        assert!(
            wait_for(&mut second, |event, _| matches!(
                event,
                WorldEvent::PlayerLeft { pid: 0 }
            ))
            .await
        );

        let fourth = Client::join(&server.address(), "d", client_config()).await.unwrap();
        assert_eq!(fourth.pid(), 0);

        server.stop().await;
    }

    #[tokio::test]
    async fn position_updates_reach_other_clients() {
        let server = RunningServer::start(4).await;

        let mut mover = Client::join(&server.address(), "mover", client_config()).await.unwrap();
        let mut watcher = Client::join(&server.address(), "watcher", client_config()).await.unwrap();

        let spawn = mover.world().local().entity_state.coords;
        let mut input = InputSource::Wander(Wanderer::seeded(11));
        for _ in 0..200 {
            mover.push_update(&mut input, 0.1).unwrap();
            if mover.world().local().entity_state.coords != spawn {
                break;
            }
        }
        let target = mover.world().local().entity_state.coords;
        assert_ne!(target, spawn, "wanderer never moved");

        let mover_pid = mover.pid();
        let seen = wait_for(&mut watcher, |event, client| {
            *event == WorldEvent::StateUpdated
                && client
                    .world()
                    .other(mover_pid)
                    .map(|state| state.entity_state.coords == target)
                    .unwrap_or(false)
        })
        .await;
        assert!(seen, "watcher never saw the mover's position");
        let observed = watcher.world().other(mover_pid).unwrap().entity_state.coords;
        assert_approx_eq!(observed.x, target.x);
        assert_approx_eq!(observed.y, target.y);

        server.stop().await;
    }

    #[tokio::test]
    async fn join_times_out_when_server_stays_silent() {
        // Accepts connections but never answers Join.
        let (silent, _events) = UdpEndpoint::bind("127.0.0.1:0", TransportConfig::default())
            .await
            .unwrap();
        let config = ClientConfig {
            join_timeout: Duration::from_millis(300),
            ..ClientConfig::default()
        };

        let result = Client::join(&silent.local_addr().unwrap().to_string(), "x", config).await;
        assert!(matches!(result, Err(NetError::JoinTimeout)));
    }
}

/// PROTOCOL ROBUSTNESS TESTS
mod protocol_tests {
    use super::*;

    #[tokio::test]
    async fn malformed_packet_disconnects_sender() {
        let server = RunningServer::start(4).await;

        let (_endpoint, peer, mut events) =
            UdpEndpoint::connect(&server.address(), TransportConfig::default())
                .await
                .unwrap();
        peer.send(&[42, 1, 2, 3], DeliveryMethod::ReliableOrdered).unwrap();

        let reason = timeout(WAIT, async {
            loop {
                match events.recv().await {
                    Some(TransportEvent::Disconnected { reason, .. }) => return Some(reason),
                    Some(_) => continue,
                    None => return None,
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(
            reason,
            Some(DisconnectReason::Remote(b"malformed packet".to_vec()))
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn clients_survive_packet_loss() {
        let server = RunningServer::start(4).await;
        let lossy = ClientConfig {
            transport: TransportConfig {
                simulated_loss: 0.2,
                min_resend_delay: Duration::from_millis(30),
                ..TransportConfig::default()
            },
            ..client_config()
        };

        let first = Client::join(&server.address(), "lossy-a", lossy.clone()).await.unwrap();
        let second = Client::join(&server.address(), "lossy-b", lossy).await.unwrap();
        assert_ne!(first.pid(), second.pid());
        assert!(first.is_connected() && second.is_connected());

        server.stop().await;
    }
}

/// RELAY TESTS
mod relay_tests {
    use super::*;

    #[tokio::test]
    async fn client_joins_through_relay() {
        let server = RunningServer::start(4).await;
        let relay = RelayNode::start("127.0.0.1:0", &server.address(), TransportConfig::default())
            .await
            .unwrap();
        let relay_addr = relay.local_addr().unwrap().to_string();
        let (stop_relay, relay_stopped) = oneshot::channel::<()>();
        let relay_task = tokio::spawn(relay.run(async {
            let _ = relay_stopped.await;
        }));

        let mut direct = Client::join(&server.address(), "direct", client_config()).await.unwrap();
        let relayed = Client::join(&relay_addr, "relayed", client_config()).await.unwrap();
        assert_eq!(direct.pid(), 0);
        assert_eq!(relayed.pid(), 1);
        assert_eq!(relayed.world().other(0).unwrap().username, "direct");

        assert!(
            wait_for(&mut direct, |event, _| matches!(
                event,
                WorldEvent::PlayerJoined { pid: 1, .. }
            ))
            .await
        );

        relayed.disconnect();
        assert!(
            wait_for(&mut direct, |event, _| matches!(
                event,
                WorldEvent::PlayerLeft { pid: 1 }
            ))
            .await
        );

        let _ = stop_relay.send(());
        let _ = timeout(WAIT, relay_task).await;
        server.stop().await;
    }
}
