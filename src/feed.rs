//! Submission feed
//!
//! Polls the platform's newest-submissions listing and emits each previously
//! unseen submission id exactly once, in arrival order. The rest of the bot
//! only sees the channel; the polling details stay here.

use crate::gateway::{GatewayError, ItemId};
use crate::FEED_TARGET;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

/// Keep the seen-id set from growing without bound on long uptimes.
const SEEN_CAP: usize = 10_000;

/// Source of the newest-submissions listing, newest first.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ItemSource: Send + Sync {
    async fn newest_item_ids(&self) -> Result<Vec<ItemId>, GatewayError>;
}

/// Poll the source forever, sending new submission ids into `tx`.
///
/// With `skip_existing`, the first poll only seeds the seen set so the
/// backlog present at startup is not re-enforced. A failed poll is logged and
/// retried on the next tick. Returns when the receiving side is gone.
pub async fn run_feed(
    source: Arc<dyn ItemSource>,
    tx: Sender<ItemId>,
    skip_existing: bool,
    poll_interval: Duration,
) {
    let mut seen: HashSet<ItemId> = HashSet::new();
    let mut first_poll = true;
    let mut interval = tokio::time::interval(poll_interval);

    loop {
        interval.tick().await;

        let listing = match source.newest_item_ids().await {
            Ok(ids) => ids,
            Err(error) => {
                warn!(target: FEED_TARGET, error = %error, "Feed poll failed");
                continue;
            }
        };

        // The listing is newest first; walk it backwards so submissions are
        // dispatched in the order they were created.
        for id in listing.iter().rev() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if first_poll && skip_existing {
                continue;
            }
            debug!(target: FEED_TARGET, item = %id, "New submission");
            if tx.send(id.clone()).await.is_err() {
                return;
            }
        }
        first_poll = false;

        if seen.len() > SEEN_CAP {
            seen.retain(|id| listing.contains(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn listing(ids: &[&str]) -> Vec<ItemId> {
        ids.iter().map(|id| ItemId::from(*id)).collect()
    }

    fn source_with(listings: Vec<Result<Vec<ItemId>, GatewayError>>) -> Arc<MockItemSource> {
        let mut source = MockItemSource::new();
        let mut remaining = listings.into_iter();
        source
            .expect_newest_item_ids()
            .returning(move || remaining.next().unwrap_or_else(|| Ok(vec![])));
        Arc::new(source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_existing_suppresses_the_startup_backlog() {
        let source = source_with(vec![
            Ok(listing(&["b", "a"])),
            Ok(listing(&["c", "b", "a"])),
        ]);
        let (tx, mut rx) = mpsc::channel(10);
        let feed = tokio::spawn(run_feed(source, tx, true, Duration::from_secs(60)));

        // Only the submission that arrived after startup comes through
        assert_eq!(rx.recv().await.unwrap(), ItemId::from("c"));
        feed.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_in_arrival_order_without_duplicates() {
        let source = source_with(vec![
            Ok(listing(&["b", "a"])),
            Ok(listing(&["d", "c", "b", "a"])),
        ]);
        let (tx, mut rx) = mpsc::channel(10);
        let feed = tokio::spawn(run_feed(source, tx, false, Duration::from_secs(60)));

        assert_eq!(rx.recv().await.unwrap(), ItemId::from("a"));
        assert_eq!(rx.recv().await.unwrap(), ItemId::from("b"));
        assert_eq!(rx.recv().await.unwrap(), ItemId::from("c"));
        assert_eq!(rx.recv().await.unwrap(), ItemId::from("d"));
        feed.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_is_retried_next_tick() {
        let source = source_with(vec![
            Err(GatewayError::Api {
                status: 503,
                detail: "unavailable".to_string(),
            }),
            Ok(listing(&["a"])),
        ]);
        let (tx, mut rx) = mpsc::channel(10);
        let feed = tokio::spawn(run_feed(source, tx, false, Duration::from_secs(60)));

        assert_eq!(rx.recv().await.unwrap(), ItemId::from("a"));
        feed.abort();
    }
}
