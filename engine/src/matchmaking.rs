//! Single-slot quick-match rendezvous.
//!
//! Not a fair queue: at most one session id waits for a second player. A
//! request racing exactly at the clearing instant may observe either outcome,
//! which is safe because an extra joiner to a `Waiting` session simply binds
//! the free role.

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::Mutex;

pub struct MatchmakingQueue {
    slot: Mutex<Option<String>>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Pairs two callers onto one session id. Returns `(session_id, waiting)`
    /// where `waiting` is true for the first caller of a pair.
    pub async fn request_quick_match(&self) -> (String, bool) {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            Some(session_id) => (session_id, false),
            None => {
                let session_id = generate_session_id();
                *slot = Some(session_id.clone());
                (session_id, true)
            }
        }
    }
}

impl Default for MatchmakingQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_session_id() -> String {
    let tag: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("qm-{}", tag)
}
