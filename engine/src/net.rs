//! UDP transport front end.
//!
//! Datagrams carry bincode-encoded [`Packet`]s. A source address is admitted
//! as a connection on first contact: the router learns its outbound channel
//! and a per-connection task drains that channel onto the socket. Silent
//! peers are timed out and surfaced to the router as disconnects, so the
//! pause/resume path covers dropped links as well as explicit leaves.

use crate::router::Router;
use crate::session::ConnId;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::Packet;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Events surfaced by the receiver task to the dispatch loop.
#[derive(Debug)]
enum NetEvent {
    Datagram { packet: Packet, addr: SocketAddr },
}

struct Peer {
    conn: ConnId,
    last_seen: Instant,
}

pub struct Server {
    socket: Arc<UdpSocket>,
    router: Router,
    peers: HashMap<SocketAddr, Peer>,
    next_conn_id: ConnId,
    event_tx: mpsc::UnboundedSender<NetEvent>,
    event_rx: mpsc::UnboundedReceiver<NetEvent>,
}

impl Server {
    pub async fn bind(addr: &str, router: Router) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("engine listening on {}", socket.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Self {
            socket,
            router,
            peers: HashMap::new(),
            next_conn_id: 1,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs the dispatch loop: inbound datagrams and the inactivity sweep.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_receiver();
        let mut sweep = interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(NetEvent::Datagram { packet, addr }) => {
                            self.handle_datagram(packet, addr).await;
                        }
                        None => break,
                    }
                }
                _ = sweep.tick() => {
                    self.sweep_inactive().await;
                }
            }
        }

        Ok(())
    }

    fn spawn_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if event_tx.send(NetEvent::Datagram { packet, addr }).is_err() {
                                break;
                            }
                        } else {
                            warn!("dropping malformed datagram from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    async fn handle_datagram(&mut self, packet: Packet, addr: SocketAddr) {
        let conn = self.peer_conn(addr).await;

        match packet {
            Packet::Join {
                session_id,
                display_name,
                spectator,
                user_id,
            } => {
                self.router
                    .join(conn, &session_id, display_name, spectator, user_id)
                    .await;
            }
            Packet::QuickMatch => {
                self.router.quick_match(conn).await;
            }
            Packet::Input { direction } => self.router.input(conn, direction).await,
            Packet::RematchRequest => self.router.rematch_request(conn).await,
            Packet::RematchAccept => self.router.rematch_accept(conn).await,
            Packet::RematchDecline => self.router.rematch_decline(conn).await,
            // Keep-alive; the peer's activity clock was already refreshed.
            Packet::Ping => {}
            Packet::Disconnect => {
                info!("connection {} ({}) left", conn, addr);
                self.peers.remove(&addr);
                self.router.disconnect(conn).await;
            }
            _ => warn!("unexpected packet type from {}", addr),
        }
    }

    /// Resolves the connection for a source address, admitting it on first
    /// contact.
    async fn peer_conn(&mut self, addr: SocketAddr) -> ConnId {
        if let Some(peer) = self.peers.get_mut(&addr) {
            peer.last_seen = Instant::now();
            return peer.conn;
        }

        let conn = self.next_conn_id;
        self.next_conn_id += 1;

        let (tx, mut rx) = mpsc::unbounded_channel::<Packet>();
        self.router.register(conn, tx).await;

        let socket = Arc::clone(&self.socket);
        tokio::spawn(async move {
            // Ends when the router drops the sender on disconnect.
            while let Some(packet) = rx.recv().await {
                match serialize(&packet) {
                    Ok(data) => {
                        if let Err(e) = socket.send_to(&data, addr).await {
                            error!("failed to send to {}: {}", addr, e);
                        }
                    }
                    Err(e) => error!("failed to encode packet for {}: {}", addr, e),
                }
            }
            debug!("outbound task for {} finished", addr);
        });

        info!("connection {} admitted from {}", conn, addr);
        self.peers.insert(
            addr,
            Peer {
                conn,
                last_seen: Instant::now(),
            },
        );
        conn
    }

    /// Synthesizes disconnects for peers that went silent.
    async fn sweep_inactive(&mut self) {
        let timed_out: Vec<(SocketAddr, ConnId)> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.last_seen.elapsed() > INACTIVITY_TIMEOUT)
            .map(|(addr, peer)| (*addr, peer.conn))
            .collect();

        for (addr, conn) in timed_out {
            info!("connection {} ({}) timed out", conn, addr);
            self.peers.remove(&addr);
            self.router.disconnect(conn).await;
        }
    }
}
