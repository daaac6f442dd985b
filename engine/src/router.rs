//! Connection routing and session operations.
//!
//! The router owns the connection registry (connection id → outbound channel
//! plus an explicit `{session, role}` binding record) and implements the
//! inbound operations: join, input, disconnect, quick match, and the rematch
//! votes. Every side effect is broadcast to all connections bound to the
//! affected session; broadcasts are non-blocking sends onto per-connection
//! channels, so a slow consumer only backs up its own transport buffer.
//!
//! Events that arrive in a state that cannot handle them (an input while
//! paused, a rematch vote from a spectator, a third join while playing) are
//! deliberately silent no-ops, since untrusted clients routinely race state.

use crate::matchmaking::MatchmakingQueue;
use crate::physics::{self, RallyAccel};
use crate::reporter::{Outcome, OutcomeReporter};
use crate::scheduler;
use crate::session::{ConnId, PlayerSlot, Session};
use crate::store::{SessionHandle, SessionStore};
use log::{debug, info};
use shared::{MoveDir, Packet, Role, SessionStatus, Snapshot, TICK_HZ, WIN_SCORE};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed simulation period.
    pub tick: Duration,
    /// Score at which a session finishes.
    pub win_score: u32,
    /// Delay after `Finished` before an inactive session is purged.
    pub grace_period: Duration,
    /// Optional rally speed-up; `None` keeps post-bounce speed constant.
    pub rally_accel: Option<RallyAccel>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis((1000 / TICK_HZ) as u64),
            win_score: WIN_SCORE,
            grace_period: Duration::from_secs(30),
            rally_accel: None,
        }
    }
}

/// Where a connection is currently bound. `role` is `None` for spectators.
#[derive(Debug, Clone)]
struct Binding {
    session_id: String,
    role: Option<Role>,
}

struct Connection {
    sender: mpsc::UnboundedSender<Packet>,
    binding: Option<Binding>,
}

struct Inner {
    config: EngineConfig,
    store: SessionStore,
    queue: MatchmakingQueue,
    connections: Mutex<HashMap<ConnId, Connection>>,
    reporter: OutcomeReporter,
}

/// Cheaply clonable handle shared by the transport layer and the per-session
/// tick tasks.
#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

impl Router {
    pub fn new(config: EngineConfig, reporter: OutcomeReporter) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store: SessionStore::new(),
                queue: MatchmakingQueue::new(),
                connections: Mutex::new(HashMap::new()),
                reporter,
            }),
        }
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Registers a live transport connection and its outbound channel.
    pub async fn register(&self, conn: ConnId, sender: mpsc::UnboundedSender<Packet>) {
        let mut connections = self.inner.connections.lock().await;
        connections.insert(
            conn,
            Connection {
                sender,
                binding: None,
            },
        );
        debug!("connection {} registered", conn);
    }

    /// Resolves or creates the session, binds a free role (or admits the
    /// connection as a spectator) and replies with the assigned role plus a
    /// full state snapshot. The second player binding starts the game.
    pub async fn join(
        &self,
        conn: ConnId,
        session_id: &str,
        display_name: Option<String>,
        spectator: bool,
        user_id: Option<i64>,
    ) {
        // A connection owns at most one session binding at a time.
        self.detach(conn).await;

        let session = self.inner.store.get_or_create(session_id).await;
        let mut s = session.lock().await;

        let role = if spectator {
            None
        } else if s.player_a.is_none() {
            Some(Role::A)
        } else if s.player_b.is_none() {
            Some(Role::B)
        } else {
            // Both roles taken: the joiner is admitted as a spectator, a safe
            // no-op with respect to session state.
            None
        };

        match role {
            Some(r) => {
                let name = display_name.unwrap_or_else(|| format!("player-{}", conn));
                info!("session {}: {} bound to {:?}", s.id, name, r);
                *s.slot_mut(r) = Some(PlayerSlot {
                    conn,
                    name,
                    user_id,
                });
            }
            None => {
                s.spectators.insert(conn);
                info!("session {}: connection {} watches", s.id, conn);
            }
        }

        {
            let mut connections = self.inner.connections.lock().await;
            if let Some(c) = connections.get_mut(&conn) {
                c.binding = Some(Binding {
                    session_id: s.id.clone(),
                    role,
                });
                let _ = c.sender.send(Packet::Joined {
                    role,
                    snapshot: s.snapshot(),
                });
            }
        }

        self.broadcast(&s, players_updated(&s)).await;

        if s.status == SessionStatus::Waiting && s.both_bound() {
            s.status = SessionStatus::Playing;
            info!("session {}: both players bound, starting", s.id);
            scheduler::start(self.clone(), Arc::clone(&session), &mut s);
            self.broadcast(
                &s,
                Packet::GameStarted {
                    snapshot: s.snapshot(),
                },
            )
            .await;
        }
        // A rejoin into a paused session only rebinds the role; the resume
        // check on the next tick flips the status back to Playing.
    }

    /// Applies a paddle move immediately, outside tick boundaries. Dropped
    /// unless the connection holds a role in a session that is `Playing`.
    pub async fn input(&self, conn: ConnId, direction: MoveDir) {
        let Some(binding) = self.binding_of(conn).await else {
            return;
        };
        let Some(role) = binding.role else {
            return;
        };
        let Some(session) = self.inner.store.get(&binding.session_id).await else {
            return;
        };

        let mut s = session.lock().await;
        if s.status != SessionStatus::Playing || s.role_of(conn) != Some(role) {
            return;
        }
        physics::apply_move(&mut s.vars, role, direction);
    }

    /// Unbinds and forgets a connection. A vacated player role pauses the
    /// game rather than ending it, so the player can rejoin under the same
    /// session id.
    pub async fn disconnect(&self, conn: ConnId) {
        let removed = self.inner.connections.lock().await.remove(&conn);
        let Some(connection) = removed else {
            return;
        };
        debug!("connection {} removed", conn);
        if let Some(binding) = connection.binding {
            self.unbind(conn, binding).await;
        }
    }

    pub async fn rematch_request(&self, conn: ConnId) {
        self.rematch_vote(conn).await;
    }

    pub async fn rematch_accept(&self, conn: ConnId) {
        self.rematch_vote(conn).await;
    }

    /// Clears both intent flags and acknowledges to everyone; the session
    /// stays `Finished`.
    pub async fn rematch_decline(&self, conn: ConnId) {
        let Some((session, role)) = self.player_session(conn).await else {
            return;
        };
        let mut s = session.lock().await;
        if s.status != SessionStatus::Finished {
            return;
        }
        s.rematch_a = false;
        s.rematch_b = false;
        info!("session {}: {:?} declined a rematch", s.id, role);
        self.broadcast(&s, Packet::RematchDeclined { role }).await;
    }

    /// Pairs quick-match callers onto a shared session id and tells the
    /// caller whether an opponent is already waiting.
    pub async fn quick_match(&self, conn: ConnId) -> (String, bool) {
        let (session_id, waiting) = self.inner.queue.request_quick_match().await;
        self.inner.store.get_or_create(&session_id).await;
        self.send_to(
            conn,
            Packet::QuickMatched {
                session_id: session_id.clone(),
                waiting,
            },
        )
        .await;
        (session_id, waiting)
    }

    /// Creates a session backing a scheduled tournament match; the final
    /// score will be pushed to the tournament collaborator under `match_id`.
    pub async fn create_scheduled(&self, session_id: &str, match_id: i64) {
        let session = self.inner.store.get_or_create(session_id).await;
        session.lock().await.match_id = Some(match_id);
    }

    pub async fn session(&self, session_id: &str) -> Option<SessionHandle> {
        self.inner.store.get(session_id).await
    }

    /// Current full state of a session, for late pollers.
    pub async fn snapshot(&self, session_id: &str) -> Option<Snapshot> {
        let session = self.inner.store.get(session_id).await?;
        let s = session.lock().await;
        Some(s.snapshot())
    }

    pub async fn session_count(&self) -> usize {
        self.inner.store.len().await
    }

    /// Terminal transition: broadcast the result, hand the outcome to the
    /// reporter exactly once, stop the ticker and schedule the grace-period
    /// purge. The caller holds the session lock.
    pub(crate) async fn finish(&self, session: &SessionHandle, s: &mut Session) {
        s.status = SessionStatus::Finished;
        let winner = s.winner();
        info!(
            "session {}: game over, {:?} wins {}-{}",
            s.id, winner, s.vars.score_a, s.vars.score_b
        );

        self.broadcast(
            s,
            Packet::GameEnded {
                winner,
                score_a: s.vars.score_a,
                score_b: s.vars.score_b,
            },
        )
        .await;

        if !s.reported {
            s.reported = true;
            let loser = winner.opponent();
            self.inner.reporter.submit(Outcome {
                session_id: s.id.clone(),
                winner_user: s.slot(winner).as_ref().and_then(|p| p.user_id),
                loser_user: s.slot(loser).as_ref().and_then(|p| p.user_id),
                match_id: s.match_id,
                score_a: s.vars.score_a,
                score_b: s.vars.score_b,
            });
        }

        scheduler::stop(s);
        self.schedule_cleanup(session, s);
    }

    /// Sends a packet to every connection bound to the session. Never blocks
    /// beyond each connection's own transport buffering.
    pub(crate) async fn broadcast(&self, s: &Session, packet: Packet) {
        let connections = self.inner.connections.lock().await;
        for id in s.conn_ids() {
            if let Some(c) = connections.get(&id) {
                let _ = c.sender.send(packet.clone());
            }
        }
    }

    async fn send_to(&self, conn: ConnId, packet: Packet) {
        if let Some(c) = self.inner.connections.lock().await.get(&conn) {
            let _ = c.sender.send(packet);
        }
    }

    /// Both rematch operations set the voter's flag; the session restarts
    /// only once both flags are up.
    async fn rematch_vote(&self, conn: ConnId) {
        let Some((session, role)) = self.player_session(conn).await else {
            return;
        };
        let mut s = session.lock().await;
        if s.status != SessionStatus::Finished {
            return;
        }

        s.set_rematch(role, true);
        if s.both_rematch() {
            s.cancel_cleanup();
            s.reset_for_rematch();
            info!("session {}: rematch accepted, restarting", s.id);
            scheduler::start(self.clone(), Arc::clone(&session), &mut s);
            self.broadcast(
                &s,
                Packet::RematchStarted {
                    snapshot: s.snapshot(),
                },
            )
            .await;
        } else {
            self.broadcast(&s, Packet::RematchRequested { role }).await;
        }
    }

    /// Drops a connection's binding without forgetting the connection, so it
    /// can immediately bind elsewhere (a connection owns one binding at a
    /// time).
    async fn detach(&self, conn: ConnId) {
        let binding = {
            let mut connections = self.inner.connections.lock().await;
            connections.get_mut(&conn).and_then(|c| c.binding.take())
        };
        if let Some(binding) = binding {
            self.unbind(conn, binding).await;
        }
    }

    async fn unbind(&self, conn: ConnId, binding: Binding) {
        let Some(session) = self.inner.store.get(&binding.session_id).await else {
            return;
        };
        let mut s = session.lock().await;

        match binding.role {
            None => {
                s.spectators.remove(&conn);
            }
            Some(role) => {
                // The slot may already belong to a replacement connection.
                if s.role_of(conn) == Some(role) {
                    *s.slot_mut(role) = None;
                    if s.status == SessionStatus::Playing {
                        s.status = SessionStatus::Paused;
                        info!("session {}: {:?} vacated, pausing", s.id, role);
                    }
                }
            }
        }

        self.broadcast(&s, players_updated(&s)).await;
    }

    fn schedule_cleanup(&self, session: &SessionHandle, s: &mut Session) {
        s.cancel_cleanup();

        let router = self.clone();
        let session = Arc::clone(session);
        let id = s.id.clone();
        s.cleanup_task = Some(tokio::spawn(async move {
            tokio::time::sleep(router.inner.config.grace_period).await;
            // Re-check under the session lock: an accepted rematch aborts
            // this task, but may race the timer firing.
            let s = session.lock().await;
            if s.status == SessionStatus::Finished {
                router.inner.store.remove(&id).await;
                info!("session {}: purged after grace period", id);
            }
        }));
    }

    async fn player_session(&self, conn: ConnId) -> Option<(SessionHandle, Role)> {
        let binding = self.binding_of(conn).await?;
        let role = binding.role?;
        let session = self.inner.store.get(&binding.session_id).await?;
        Some((session, role))
    }

    async fn binding_of(&self, conn: ConnId) -> Option<Binding> {
        self.inner
            .connections
            .lock()
            .await
            .get(&conn)
            .and_then(|c| c.binding.clone())
    }
}

fn players_updated(s: &Session) -> Packet {
    Packet::PlayersUpdated {
        player_a: s.player_name(Role::A),
        player_b: s.player_name(Role::B),
        spectators: s.spectators.len() as u32,
    }
}
