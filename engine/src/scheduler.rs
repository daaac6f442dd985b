//! Per-session fixed-rate tick task.
//!
//! One independent timer per session, started on entering `Playing`. Ticks
//! are strictly sequential: the session lock is held for the whole physics
//! update, and a late timer firing is skipped rather than replayed, so a tick
//! always observes a fully settled prior state.

use crate::physics;
use crate::router::Router;
use crate::session::Session;
use crate::store::SessionHandle;
use log::{debug, info};
use shared::{Packet, SessionStatus};
use tokio::time::{interval, MissedTickBehavior};

/// Starts the tick task for a session entering `Playing`, replacing any
/// previous task. The caller holds the session lock.
pub(crate) fn start(router: Router, session: SessionHandle, s: &mut Session) {
    stop(s);
    s.tick_task = Some(tokio::spawn(run(router, session)));
}

/// Idempotently stops a session's tick task: stopping twice, or stopping a
/// session that never ran, is a safe no-op.
pub(crate) fn stop(s: &mut Session) {
    if let Some(handle) = s.tick_task.take() {
        handle.abort();
    }
}

async fn run(router: Router, session: SessionHandle) {
    let mut ticker = interval(router.config().tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The interval's first firing completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let mut s = session.lock().await;
        match s.status {
            SessionStatus::Paused => {
                // Automatic resume once both roles are bound again.
                if s.both_bound() {
                    s.status = SessionStatus::Playing;
                    info!("session {}: both players back, resuming", s.id);
                    router
                        .broadcast(
                            &s,
                            Packet::GameResumed {
                                snapshot: s.snapshot(),
                            },
                        )
                        .await;
                }
            }
            SessionStatus::Playing => {
                let scored = physics::step(&mut s.vars, router.config().rally_accel);
                if let Some(role) = scored {
                    debug!(
                        "session {}: point for {:?} ({}-{})",
                        s.id, role, s.vars.score_a, s.vars.score_b
                    );
                }

                let win = router.config().win_score;
                if s.vars.score_a >= win || s.vars.score_b >= win {
                    // No further tick is applied once the threshold is hit.
                    router.finish(&session, &mut s).await;
                    break;
                }

                router
                    .broadcast(
                        &s,
                        Packet::StateUpdate {
                            vars: s.vars.clone(),
                        },
                    )
                    .await;
            }
            // Stopped externally, or the session was torn down under us.
            SessionStatus::Waiting | SessionStatus::Finished => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_without_task_is_noop() {
        let mut session = Session::new("m1".to_string());
        stop(&mut session);
        stop(&mut session);
        assert!(session.tick_task.is_none());
    }

    #[tokio::test]
    async fn test_stop_twice_after_task() {
        let mut session = Session::new("m1".to_string());
        session.tick_task = Some(tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        }));

        stop(&mut session);
        assert!(session.tick_task.is_none());
        stop(&mut session);
        assert!(session.tick_task.is_none());
    }
}
