//! Feed dispatcher
//!
//! Turns the stream of newly created submissions into one spawned enforcement
//! run each, fire-and-forget. Runs are tracked in a join set so every
//! completion, abort, and panic is observed and logged instead of silently
//! swallowed, and a slow run never delays the next submission.

use crate::enforcement::engine::{EnforcementEngine, RunOutcome};
use crate::enforcement::error::EnforcementResult;
use crate::gateway::ItemId;
use crate::{ENFORCEMENT_TARGET, ERROR_TARGET};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

/// Spawns and supervises one enforcement run per incoming submission.
#[derive(Clone)]
pub struct FeedDispatcher {
    engine: EnforcementEngine,
    /// Submissions with a run currently in flight, by spawn time.
    in_flight: Arc<DashMap<ItemId, DateTime<Utc>>>,
}

impl FeedDispatcher {
    pub fn new(engine: EnforcementEngine) -> Self {
        Self {
            engine,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Number of runs currently in flight.
    ///
    /// These runs hold no persistent state; whatever is in flight when the
    /// process stops is abandoned, not resumed.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Consume the feed until it closes, spawning one run per submission.
    ///
    /// Spawning never waits on running tasks, so there is no back-pressure
    /// from slow runs. Once the feed closes, remaining runs are drained to
    /// completion before returning; abandonment only happens if the caller
    /// drops or aborts this future.
    pub async fn dispatch(&self, mut feed: Receiver<ItemId>) {
        let mut runs: JoinSet<(ItemId, EnforcementResult<RunOutcome>)> = JoinSet::new();

        loop {
            tokio::select! {
                incoming = feed.recv() => match incoming {
                    Some(id) => {
                        debug!(target: ENFORCEMENT_TARGET, item = %id, "Starting enforcement run");
                        self.in_flight.insert(id.clone(), Utc::now());

                        let engine = self.engine.clone();
                        runs.spawn(async move {
                            let result = engine.run(&id).await;
                            (id, result)
                        });
                    }
                    None => break,
                },
                Some(joined) = runs.join_next(), if !runs.is_empty() => {
                    self.reap(joined);
                }
            }
        }

        info!(
            target: ENFORCEMENT_TARGET,
            remaining = runs.len(),
            "Feed closed, draining in-flight runs"
        );
        while let Some(joined) = runs.join_next().await {
            self.reap(joined);
        }
    }

    /// Record the terminal result of one run. Failures stay scoped to the run
    /// they happened in.
    fn reap(&self, joined: Result<(ItemId, EnforcementResult<RunOutcome>), JoinError>) {
        match joined {
            Ok((id, Ok(outcome))) => {
                self.in_flight.remove(&id);
                info!(
                    target: ENFORCEMENT_TARGET,
                    item = %id,
                    outcome = %outcome,
                    "Run completed"
                );
            }
            Ok((id, Err(error))) => {
                self.in_flight.remove(&id);
                error!(
                    target: ERROR_TARGET,
                    item = %id,
                    error = %error,
                    "Run aborted"
                );
            }
            Err(join_error) => {
                // Panic inside a run; the item id went down with the task
                error!(target: ERROR_TARGET, error = %join_error, "Run panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gateway::{GatewayError, ItemSnapshot, MockItemGateway};
    use chrono::Duration;
    use tokio::sync::mpsc;

    fn test_config(time_until_remove: u64) -> Config {
        Config {
            time_until_message: 0,
            time_until_remove,
            add_flair_subject: "subject".to_string(),
            add_flair_message: "{post_url} {time_until_remove}".to_string(),
            tech_support_flair: "ts-flair".to_string(),
            tech_support_rr: "rr-ts".to_string(),
            battlestation_flairs: vec![],
            battlestation_rr: "rr-bs".to_string(),
        }
    }

    fn flaired(id: &ItemId) -> ItemSnapshot {
        ItemSnapshot {
            id: id.clone(),
            title: "A submission".to_string(),
            permalink: format!("https://redd.it/{id}"),
            author: "author".to_string(),
            created_at: Utc::now() - Duration::seconds(5),
            flair_text: Some("Discussion".to_string()),
            flair_template_id: Some("other-flair".to_string()),
            approved_by: None,
        }
    }

    fn unflaired(id: &ItemId) -> ItemSnapshot {
        let mut item = flaired(id);
        item.flair_text = None;
        item.flair_template_id = None;
        item
    }

    #[tokio::test]
    async fn test_failed_run_does_not_affect_others() {
        let mut gateway = MockItemGateway::new();
        gateway.expect_fetch_item().times(2).returning(|id| {
            if id == &ItemId::from("bad") {
                Err(GatewayError::NotFound("bad".to_string()))
            } else {
                Ok(flaired(id))
            }
        });

        let engine = EnforcementEngine::new(
            Arc::new(gateway),
            Arc::new(test_config(0)),
        );
        let dispatcher = FeedDispatcher::new(engine);

        let (tx, rx) = mpsc::channel(100);
        tx.send(ItemId::from("bad")).await.unwrap();
        tx.send(ItemId::from("good")).await.unwrap();
        drop(tx);

        dispatcher.dispatch(rx).await;
        assert_eq!(dispatcher.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_wait_concurrently_not_sequentially() {
        let mut gateway = MockItemGateway::new();
        // Each run fetches twice: once on load, once on recheck
        gateway
            .expect_fetch_item()
            .times(4)
            .returning(|id| Ok(unflaired(id)));
        gateway
            .expect_list_sent_messages()
            .times(2)
            .returning(|| Ok(vec![]));
        gateway
            .expect_send_direct_message()
            .times(2)
            .returning(|_, _, _| Ok(()));
        gateway
            .expect_remove_item_plain()
            .times(2)
            .returning(|_| Ok(()));

        let engine = EnforcementEngine::new(
            Arc::new(gateway),
            Arc::new(test_config(3_600)),
        );
        let dispatcher = FeedDispatcher::new(engine);

        let (tx, rx) = mpsc::channel(100);
        tx.send(ItemId::from("one")).await.unwrap();
        tx.send(ItemId::from("two")).await.unwrap();
        drop(tx);

        let start = tokio::time::Instant::now();
        dispatcher.dispatch(rx).await;

        // Two one-hour grace periods overlap instead of queueing
        let elapsed = start.elapsed();
        assert!(elapsed >= std::time::Duration::from_secs(59 * 60), "took {elapsed:?}");
        assert!(elapsed < std::time::Duration::from_secs(90 * 60), "took {elapsed:?}");
        assert_eq!(dispatcher.in_flight_count(), 0);
    }
}
