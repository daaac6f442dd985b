//! Exactly-once outcome delivery to the external stats and tournament
//! collaborators.
//!
//! The engine never talks to a collaborator from the tick path: it hands a
//! finished session's outcome to a channel consumed by the reporter task.
//! Collaborator failures are logged and swallowed; the in-memory session has
//! already reached its authoritative terminal state.

use log::{info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Narrow interface over the two external collaborators, so the engine can be
/// driven against a fake in tests.
pub trait OutcomeSink: Send + Sync {
    /// Win/loss attribution for the stats store.
    fn record_outcome(&self, winner_user: i64, loser_user: i64) -> Result<(), SinkError>;

    /// Final score for bracket advancement of a scheduled tournament match.
    fn report_match_score(&self, match_id: i64, score_a: u32, score_b: u32)
        -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub session_id: String,
    pub winner_user: Option<i64>,
    pub loser_user: Option<i64>,
    pub match_id: Option<i64>,
    pub score_a: u32,
    pub score_b: u32,
}

#[derive(Clone)]
pub struct OutcomeReporter {
    tx: mpsc::UnboundedSender<Outcome>,
}

impl OutcomeReporter {
    /// Spawns the consumer task and returns the submission handle.
    pub fn spawn(sink: Arc<dyn OutcomeSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();

        tokio::spawn(async move {
            while let Some(outcome) = rx.recv().await {
                deliver(sink.as_ref(), outcome);
            }
        });

        Self { tx }
    }

    /// Queues an outcome for delivery without blocking the caller.
    pub fn submit(&self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            warn!("outcome reporter task is gone, dropping report");
        }
    }
}

fn deliver(sink: &dyn OutcomeSink, outcome: Outcome) {
    match (outcome.winner_user, outcome.loser_user) {
        (Some(winner), Some(loser)) => {
            if let Err(e) = sink.record_outcome(winner, loser) {
                warn!(
                    "session {}: stats report failed: {}",
                    outcome.session_id, e
                );
            }
        }
        // Anonymous quick matches carry no user ids; nothing to record.
        _ => info!(
            "session {}: anonymous participant, skipping stats report",
            outcome.session_id
        ),
    }

    if let Some(match_id) = outcome.match_id {
        if let Err(e) = sink.report_match_score(match_id, outcome.score_a, outcome.score_b) {
            warn!(
                "session {}: tournament report for match {} failed: {}",
                outcome.session_id, match_id, e
            );
        }
    }
}

/// Sink used when no collaborators are wired up; logs and succeeds.
pub struct LogSink;

impl OutcomeSink for LogSink {
    fn record_outcome(&self, winner_user: i64, loser_user: i64) -> Result<(), SinkError> {
        info!("outcome: user {} beat user {}", winner_user, loser_user);
        Ok(())
    }

    fn report_match_score(
        &self,
        match_id: i64,
        score_a: u32,
        score_b: u32,
    ) -> Result<(), SinkError> {
        info!("match {}: final score {}-{}", match_id, score_a, score_b);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    #[derive(Default)]
    struct CountingSink {
        outcomes: AtomicUsize,
        scores: Mutex<Vec<(i64, u32, u32)>>,
        fail_outcomes: bool,
    }

    impl OutcomeSink for CountingSink {
        fn record_outcome(&self, _winner: i64, _loser: i64) -> Result<(), SinkError> {
            self.outcomes.fetch_add(1, Ordering::SeqCst);
            if self.fail_outcomes {
                return Err("stats store unreachable".into());
            }
            Ok(())
        }

        fn report_match_score(
            &self,
            match_id: i64,
            score_a: u32,
            score_b: u32,
        ) -> Result<(), SinkError> {
            self.scores
                .lock()
                .unwrap()
                .push((match_id, score_a, score_b));
            Ok(())
        }
    }

    fn outcome(winner: Option<i64>, loser: Option<i64>, match_id: Option<i64>) -> Outcome {
        Outcome {
            session_id: "m1".to_string(),
            winner_user: winner,
            loser_user: loser,
            match_id,
            score_a: 5,
            score_b: 2,
        }
    }

    #[tokio::test]
    async fn test_full_outcome_hits_both_collaborators() {
        let sink = Arc::new(CountingSink::default());
        let reporter = OutcomeReporter::spawn(sink.clone());

        reporter.submit(outcome(Some(1), Some(2), Some(77)));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(sink.outcomes.load(Ordering::SeqCst), 1);
        assert_eq!(*sink.scores.lock().unwrap(), vec![(77, 5, 2)]);
    }

    #[tokio::test]
    async fn test_anonymous_outcome_skips_stats() {
        let sink = Arc::new(CountingSink::default());
        let reporter = OutcomeReporter::spawn(sink.clone());

        reporter.submit(outcome(Some(1), None, None));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(sink.outcomes.load(Ordering::SeqCst), 0);
        assert!(sink.scores.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let sink = Arc::new(CountingSink {
            fail_outcomes: true,
            ..Default::default()
        });
        let reporter = OutcomeReporter::spawn(sink.clone());

        reporter.submit(outcome(Some(1), Some(2), Some(9)));
        sleep(Duration::from_millis(50)).await;

        // The stats failure did not stop the tournament report.
        assert_eq!(sink.outcomes.load(Ordering::SeqCst), 1);
        assert_eq!(sink.scores.lock().unwrap().len(), 1);
    }
}
