//! Warning message dedup
//!
//! Decides whether a specific warning has already been delivered by scanning
//! the bot account's own sent-message history. This is what keeps a process
//! restart from re-warning an author whose grace period is already running.

use crate::gateway::{GatewayError, ItemGateway};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Presence index over the bot's sent direct messages.
///
/// The history is only observed, never locked, so the answer is a
/// point-in-time one. That is sufficient because at most one enforcement run
/// exists per submission within a process.
#[derive(Clone)]
pub struct DedupIndex {
    gateway: Arc<dyn ItemGateway>,
}

impl DedupIndex {
    pub fn new(gateway: Arc<dyn ItemGateway>) -> Self {
        Self { gateway }
    }

    /// Whether a message with exactly this body was already sent.
    ///
    /// Returns the earliest matching message's timestamp, which anchors the
    /// removal grace period. Matching is exact on the full body; a template
    /// change between send and re-evaluation will not match (known
    /// limitation).
    ///
    /// # Errors
    ///
    /// Propagates history-fetch failures. Treating an unreadable history as
    /// "not sent" would risk duplicate warnings, so the caller aborts the run
    /// instead.
    pub async fn has_been_sent(
        &self,
        body: &str,
    ) -> Result<Option<DateTime<Utc>>, GatewayError> {
        let sent = self.gateway.list_sent_messages().await?;
        Ok(sent
            .iter()
            .filter(|message| message.body == body)
            .map(|message| message.sent_at)
            .min())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MockItemGateway, SentMessage};
    use chrono::TimeZone;

    fn message(body: &str, sent_at: DateTime<Utc>) -> SentMessage {
        SentMessage {
            recipient: "someone".to_string(),
            body: body.to_string(),
            sent_at,
        }
    }

    #[tokio::test]
    async fn test_exact_body_match_only() {
        let sent_at = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let mut gateway = MockItemGateway::new();
        gateway.expect_list_sent_messages().returning(move || {
            Ok(vec![
                message("please add flair", sent_at),
                message("please add flair!", sent_at),
            ])
        });

        let index = DedupIndex::new(Arc::new(gateway));
        assert_eq!(
            index.has_been_sent("please add flair").await.unwrap(),
            Some(sent_at)
        );
        assert_eq!(index.has_been_sent("please add FLAIR").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_earliest_match_wins() {
        let earlier = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap();
        let mut gateway = MockItemGateway::new();
        gateway.expect_list_sent_messages().returning(move || {
            Ok(vec![message("warn", later), message("warn", earlier)])
        });

        let index = DedupIndex::new(Arc::new(gateway));
        assert_eq!(index.has_been_sent("warn").await.unwrap(), Some(earlier));
    }

    #[tokio::test]
    async fn test_history_failure_propagates() {
        let mut gateway = MockItemGateway::new();
        gateway.expect_list_sent_messages().returning(|| {
            Err(GatewayError::Api {
                status: 503,
                detail: "unavailable".to_string(),
            })
        });

        let index = DedupIndex::new(Arc::new(gateway));
        assert!(index.has_been_sent("warn").await.is_err());
    }
}
