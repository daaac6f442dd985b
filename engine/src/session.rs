//! The per-match session record and its status bookkeeping.
//!
//! A session is owned by the [`SessionStore`](crate::store::SessionStore) and
//! mutated only behind its per-session lock, by the router on inbound events
//! and by the tick task between them, never concurrently.

use shared::{GameVars, Role, SessionStatus, Snapshot};
use std::collections::HashSet;
use tokio::task::JoinHandle;

/// Identifier the transport layer assigns to a live connection.
pub type ConnId = u32;

/// A connection currently bound to one of the two playable roles.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub conn: ConnId,
    pub name: String,
    pub user_id: Option<i64>,
}

pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    pub vars: GameVars,
    pub player_a: Option<PlayerSlot>,
    pub player_b: Option<PlayerSlot>,
    pub spectators: HashSet<ConnId>,
    pub rematch_a: bool,
    pub rematch_b: bool,
    /// Set the first time the outcome is handed to the reporter for the
    /// current `Finished` episode; cleared on rematch.
    pub reported: bool,
    /// Present only when this session backs a scheduled tournament match.
    pub match_id: Option<i64>,
    pub tick_task: Option<JoinHandle<()>>,
    pub cleanup_task: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(id: String) -> Self {
        Self {
            id,
            status: SessionStatus::Waiting,
            vars: GameVars::new(),
            player_a: None,
            player_b: None,
            spectators: HashSet::new(),
            rematch_a: false,
            rematch_b: false,
            reported: false,
            match_id: None,
            tick_task: None,
            cleanup_task: None,
        }
    }

    pub fn slot(&self, role: Role) -> &Option<PlayerSlot> {
        match role {
            Role::A => &self.player_a,
            Role::B => &self.player_b,
        }
    }

    pub fn slot_mut(&mut self, role: Role) -> &mut Option<PlayerSlot> {
        match role {
            Role::A => &mut self.player_a,
            Role::B => &mut self.player_b,
        }
    }

    /// The role a connection currently plays, if any.
    pub fn role_of(&self, conn: ConnId) -> Option<Role> {
        if self.player_a.as_ref().map(|p| p.conn) == Some(conn) {
            Some(Role::A)
        } else if self.player_b.as_ref().map(|p| p.conn) == Some(conn) {
            Some(Role::B)
        } else {
            None
        }
    }

    pub fn both_bound(&self) -> bool {
        self.player_a.is_some() && self.player_b.is_some()
    }

    pub fn player_name(&self, role: Role) -> Option<String> {
        self.slot(role).as_ref().map(|p| p.name.clone())
    }

    /// Every connection that should receive this session's broadcasts.
    pub fn conn_ids(&self) -> Vec<ConnId> {
        let mut ids: Vec<ConnId> = self
            .player_a
            .iter()
            .chain(self.player_b.iter())
            .map(|p| p.conn)
            .collect();
        ids.extend(self.spectators.iter().copied());
        ids
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            vars: self.vars.clone(),
            player_a: self.player_name(Role::A),
            player_b: self.player_name(Role::B),
            spectators: self.spectators.len() as u32,
        }
    }

    /// Winner by score comparison. Equal scores cannot occur at the finish
    /// transition, since it fires the instant one side crosses the threshold.
    pub fn winner(&self) -> Role {
        if self.vars.score_a >= self.vars.score_b {
            Role::A
        } else {
            Role::B
        }
    }

    pub fn rematch_flag(&self, role: Role) -> bool {
        match role {
            Role::A => self.rematch_a,
            Role::B => self.rematch_b,
        }
    }

    pub fn set_rematch(&mut self, role: Role, value: bool) {
        match role {
            Role::A => self.rematch_a = value,
            Role::B => self.rematch_b = value,
        }
    }

    pub fn both_rematch(&self) -> bool {
        self.rematch_a && self.rematch_b
    }

    /// Re-enters `Playing` from `Finished` with fresh continuous state.
    pub fn reset_for_rematch(&mut self) {
        self.vars = GameVars::new();
        self.rematch_a = false;
        self.rematch_b = false;
        self.reported = false;
        self.status = SessionStatus::Playing;
    }

    /// Aborts the grace-period purge, if one is pending. Idempotent.
    pub fn cancel_cleanup(&mut self) {
        if let Some(handle) = self.cleanup_task.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(conn: ConnId, name: &str) -> Option<PlayerSlot> {
        Some(PlayerSlot {
            conn,
            name: name.to_string(),
            user_id: None,
        })
    }

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("m1".to_string());

        assert_eq!(session.status, SessionStatus::Waiting);
        assert!(!session.both_bound());
        assert!(session.conn_ids().is_empty());
        assert!(!session.reported);
        assert!(session.match_id.is_none());
    }

    #[test]
    fn test_role_of_and_both_bound() {
        let mut session = Session::new("m1".to_string());
        session.player_a = slot(7, "alice");

        assert_eq!(session.role_of(7), Some(Role::A));
        assert_eq!(session.role_of(8), None);
        assert!(!session.both_bound());

        session.player_b = slot(8, "bob");
        assert_eq!(session.role_of(8), Some(Role::B));
        assert!(session.both_bound());
    }

    #[test]
    fn test_conn_ids_includes_spectators() {
        let mut session = Session::new("m1".to_string());
        session.player_a = slot(1, "alice");
        session.player_b = slot(2, "bob");
        session.spectators.insert(3);
        session.spectators.insert(4);

        let mut ids = session.conn_ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_winner_by_score() {
        let mut session = Session::new("m1".to_string());
        session.vars.score_a = 5;
        session.vars.score_b = 3;
        assert_eq!(session.winner(), Role::A);

        session.vars.score_a = 2;
        session.vars.score_b = 5;
        assert_eq!(session.winner(), Role::B);
    }

    #[test]
    fn test_rematch_flags() {
        let mut session = Session::new("m1".to_string());
        session.set_rematch(Role::A, true);
        assert!(session.rematch_flag(Role::A));
        assert!(!session.both_rematch());

        session.set_rematch(Role::B, true);
        assert!(session.both_rematch());
    }

    #[test]
    fn test_reset_for_rematch_clears_state() {
        let mut session = Session::new("m1".to_string());
        session.status = SessionStatus::Finished;
        session.vars.score_a = 5;
        session.vars.score_b = 2;
        session.rematch_a = true;
        session.rematch_b = true;
        session.reported = true;

        session.reset_for_rematch();

        assert_eq!(session.status, SessionStatus::Playing);
        assert_eq!(session.vars.score_a, 0);
        assert_eq!(session.vars.score_b, 0);
        assert!(!session.rematch_a);
        assert!(!session.rematch_b);
        assert!(!session.reported);
    }

    #[test]
    fn test_snapshot_reflects_bindings() {
        let mut session = Session::new("m1".to_string());
        session.player_a = slot(1, "alice");
        session.spectators.insert(9);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.player_a.as_deref(), Some("alice"));
        assert!(snapshot.player_b.is_none());
        assert_eq!(snapshot.spectators, 1);
    }
}
