//! Relay node: accepts client connections and forwards their sessions to an
//! upstream game server over one connection.

use log::{debug, info, warn};
use shared::relay::RelayHub;
use shared::{Peer, Result, TransportConfig, TransportEvent, UdpEndpoint};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct RelayNode {
    hub: RelayHub,
    downstream: UdpEndpoint,
    client_events: mpsc::UnboundedReceiver<TransportEvent>,
    _upstream_endpoint: UdpEndpoint,
    upstream_events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl RelayNode {
    /// Connects to `upstream`, announces itself and starts listening on `listen`.
    pub async fn start(listen: &str, upstream: &str, config: TransportConfig) -> Result<Self> {
        let (upstream_endpoint, upstream_peer, upstream_events) =
            UdpEndpoint::connect(upstream, config.clone()).await?;
        let (downstream, client_events) = UdpEndpoint::bind(listen, config).await?;

        let upstream_peer: Arc<dyn Peer> = upstream_peer;
        let hub = RelayHub::new(upstream_peer);
        hub.announce()?;
        info!(
            "Relaying {} -> {}",
            downstream.local_addr()?,
            hub.upstream().address_string()
        );

        Ok(RelayNode {
            hub,
            downstream,
            client_events,
            _upstream_endpoint: upstream_endpoint,
            upstream_events,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.downstream.local_addr()
    }

    /// Forwards traffic until `shutdown` resolves or the upstream connection is lost.
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = self.client_events.recv() => match event {
                    Some(event) => self.handle_client_event(event),
                    None => break,
                },
                event = self.upstream_events.recv() => match event {
                    Some(TransportEvent::Received { payload, method, .. }) => {
                        if let Err(e) = self.hub.forward_down(&payload, method) {
                            debug!("Dropping upstream payload: {}", e);
                        }
                    }
                    Some(TransportEvent::Disconnected { reason, .. }) => {
                        warn!("Lost upstream: {:?}", reason);
                        self.hub.upstream_lost();
                        break;
                    }
                    Some(TransportEvent::Connected(_)) => {}
                    None => break,
                },
                _ = &mut shutdown => {
                    info!("Shutting down relay");
                    break;
                }
            }
        }

        self.downstream.shutdown(b"relay shutting down");
        self.hub.upstream().disconnect(Some(b"relay shutting down"));
        Ok(())
    }

    fn handle_client_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(client) => {
                self.hub.attach(client);
            }
            TransportEvent::Received {
                peer,
                payload,
                method,
            } => {
                if let Err(e) = self.hub.forward_up(peer.id(), &payload, method) {
                    warn!("Upstream send failed: {}", e);
                }
            }
            TransportEvent::Disconnected { peer_id, reason } => {
                debug!("Client {} left: {:?}", peer_id, reason);
                self.hub.detach(peer_id, None);
            }
        }
    }
}
