//! Bot configuration
//!
//! The configuration lives on the subreddit wiki as a YAML document and is
//! loaded exactly once at startup. After that it is immutable and shared by
//! reference into every enforcement run.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Policy parameters for a single subreddit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Seconds after creation before an unflaired submission's author is warned
    pub time_until_message: u64,
    // Seconds of grace period between the warning anchor and removal
    pub time_until_remove: u64,

    // Subject line of the warning direct message
    pub add_flair_subject: String,
    // Body template; supports {post_url} and {time_until_remove} placeholders
    pub add_flair_message: String,

    // Flair template id that marks a tech support submission
    pub tech_support_flair: String,
    // Removal reason id used for tech support removals
    pub tech_support_rr: String,

    // Flair template ids that mark battlestation submissions
    pub battlestation_flairs: Vec<String>,
    // Removal reason id used for battlestation removals
    pub battlestation_rr: String,
}

impl Config {
    /// Parse a configuration from its YAML wiki-page source.
    ///
    /// # Errors
    ///
    /// Returns a `serde_yaml::Error` if the document is malformed or missing
    /// required fields. Treated as fatal by the caller.
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// Delay between submission creation and the missing-flair warning.
    #[must_use]
    pub fn time_until_message(&self) -> Duration {
        Duration::seconds(i64::try_from(self.time_until_message).unwrap_or(i64::MAX))
    }

    /// Grace period between the warning anchor and removal.
    #[must_use]
    pub fn time_until_remove(&self) -> Duration {
        Duration::seconds(i64::try_from(self.time_until_remove).unwrap_or(i64::MAX))
    }

    /// Whether a flair template id selects the battlestation policy.
    #[must_use]
    pub fn is_battlestation_flair(&self, flair_template_id: &str) -> bool {
        self.battlestation_flairs
            .iter()
            .any(|id| id == flair_template_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
time_until_message: 600
time_until_remove: 86400
add_flair_subject: Your submission needs flair
add_flair_message: |
  Please add flair to {post_url} within {time_until_remove} or it will be removed.
tech_support_flair: abc-123
tech_support_rr: rr-ts
battlestation_flairs:
  - bs-one
  - bs-two
battlestation_rr: rr-bs
";

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.time_until_message, 600);
        assert_eq!(config.time_until_remove, 86400);
        assert_eq!(config.tech_support_flair, "abc-123");
        assert_eq!(config.battlestation_flairs.len(), 2);
        assert_eq!(config.time_until_message(), Duration::seconds(600));
        assert_eq!(config.time_until_remove(), Duration::hours(24));
    }

    #[test]
    fn test_battlestation_membership() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert!(config.is_battlestation_flair("bs-one"));
        assert!(config.is_battlestation_flair("bs-two"));
        assert!(!config.is_battlestation_flair("abc-123"));
        assert!(!config.is_battlestation_flair(""));
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let result = Config::from_yaml("time_until_message: 600");
        assert!(result.is_err());
    }
}
