//! Item gateway contract
//!
//! This module defines the abstract surface the enforcement core uses to talk
//! to the platform: reading submission state, posting comments, removing and
//! locking submissions, and sending direct messages. The concrete Reddit
//! implementation lives in [`crate::reddit`]; tests substitute a mock.

use chrono::{DateTime, Utc};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Platform id of a submission (the base36 id, without the `t3_` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, From, Into, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Platform id of a comment posted by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Display, From, Into)]
pub struct CommentId(pub String);

/// Point-in-time snapshot of a submission.
///
/// The core never owns a submission; it observes snapshots and must re-fetch
/// to see mutations made by moderators or the author in the meantime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub title: String,
    /// Full URL of the submission, used in the warning message.
    pub permalink: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// Display text of the flair, if any has been assigned.
    pub flair_text: Option<String>,
    /// Template id of the flair, if any has been assigned.
    pub flair_template_id: Option<String>,
    /// Moderator who approved the submission, if any.
    pub approved_by: Option<String>,
}

impl ItemSnapshot {
    /// Whether any flair has been assigned to the submission.
    #[must_use]
    pub fn has_flair(&self) -> bool {
        self.flair_text.as_deref().is_some_and(|text| !text.is_empty())
    }
}

/// A direct message previously sent by the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentMessage {
    pub recipient: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Errors from the platform gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure (connection, timeout, TLS)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The platform answered with a non-success status
    #[error("api error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// The platform answered with a payload we could not interpret
    #[error("unexpected response shape: {0}")]
    Decode(String),

    /// A referenced object does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

/// Abstract platform operations consumed by the enforcement core.
///
/// Every call may fail transiently or permanently; the core treats both the
/// same way and aborts the affected run. Retries, if desired, belong to the
/// implementation behind this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ItemGateway: Send + Sync {
    /// Fetch the current full state of a submission.
    async fn fetch_item(&self, id: &ItemId) -> Result<ItemSnapshot, GatewayError>;

    /// List the subreddit's current moderators by username.
    async fn list_current_moderators(&self) -> Result<HashSet<String>, GatewayError>;

    /// Reply to a submission, returning the new comment's id.
    async fn post_comment(&self, id: &ItemId, body: &str) -> Result<CommentId, GatewayError>;

    /// Distinguish a bot comment as a moderator comment and sticky it.
    async fn distinguish_and_sticky(&self, comment: &CommentId) -> Result<(), GatewayError>;

    /// Remove a submission with an attached removal reason.
    async fn remove_item(&self, id: &ItemId, reason_id: &str) -> Result<(), GatewayError>;

    /// Remove a submission without a removal reason.
    async fn remove_item_plain(&self, id: &ItemId) -> Result<(), GatewayError>;

    /// Lock a submission's comment section.
    async fn lock_item(&self, id: &ItemId) -> Result<(), GatewayError>;

    /// Send a direct message to a user.
    async fn send_direct_message(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), GatewayError>;

    /// List the bot account's sent direct messages.
    async fn list_sent_messages(&self) -> Result<Vec<SentMessage>, GatewayError>;

    /// Fetch the templated message body of a removal reason.
    async fn removal_reason_message(&self, reason_id: &str) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_flair() {
        let mut item = ItemSnapshot {
            id: ItemId::from("abc123"),
            title: "My build".to_string(),
            permalink: "https://redd.it/abc123".to_string(),
            author: "someone".to_string(),
            created_at: Utc::now(),
            flair_text: None,
            flair_template_id: None,
            approved_by: None,
        };
        assert!(!item.has_flair());

        item.flair_text = Some(String::new());
        assert!(!item.has_flair());

        item.flair_text = Some("Battlestation".to_string());
        assert!(item.has_flair());
    }

    #[test]
    fn test_item_id_display() {
        let id = ItemId::from("1abcd2");
        assert_eq!(id.to_string(), "1abcd2");
    }
}
