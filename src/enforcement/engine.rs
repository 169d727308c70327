//! Enforcement engine
//!
//! One engine run per submission. The run walks a fixed policy order: the
//! tech-support check, the missing-flair grace period (warning message, then
//! removal), and the weekday battlestation check. Runs suspend until computed
//! deadlines and always re-fetch the submission after the grace period, since
//! a human moderator or the author may have changed it in the meantime.

use crate::config::Config;
use crate::enforcement::dedup::DedupIndex;
use crate::enforcement::error::{EnforcementError, EnforcementResult};
use crate::gateway::{ItemGateway, ItemId, ItemSnapshot};
use crate::ENFORCEMENT_TARGET;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use std::sync::Arc;
use tracing::{debug, info};

/// Terminal result of a single enforcement run.
///
/// At most one removal is ever issued per run; the outcome records which
/// branch fired, mostly for the dispatcher's completion log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Removed and locked under the tech-support policy
    RemovedTechSupport,
    /// Removed (no comment, no lock) for missing flair after the grace period
    RemovedUnflaired,
    /// Removed and locked under the weekday battlestation policy
    RemovedBattlestation,
    /// No policy applied; the submission was left untouched
    LeftAlone,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemovedTechSupport => write!(f, "removed tech support"),
            Self::RemovedUnflaired => write!(f, "removed unflaired"),
            Self::RemovedBattlestation => write!(f, "removed battlestation"),
            Self::LeftAlone => write!(f, "left alone"),
        }
    }
}

/// Per-submission policy evaluator.
///
/// Holds only shared read-only state; each [`run`](Self::run) is independent
/// and owns nothing beyond its local snapshots, so any number of runs can be
/// in flight concurrently.
#[derive(Clone)]
pub struct EnforcementEngine {
    gateway: Arc<dyn ItemGateway>,
    config: Arc<Config>,
    dedup: DedupIndex,
}

impl EnforcementEngine {
    pub fn new(gateway: Arc<dyn ItemGateway>, config: Arc<Config>) -> Self {
        let dedup = DedupIndex::new(Arc::clone(&gateway));
        Self {
            gateway,
            config,
            dedup,
        }
    }

    /// Run the full policy sequence for one submission.
    ///
    /// # Errors
    ///
    /// Any gateway failure aborts this run only; the caller logs it and no
    /// other run is affected.
    pub async fn run(&self, id: &ItemId) -> EnforcementResult<RunOutcome> {
        let mut item = self
            .gateway
            .fetch_item(id)
            .await
            .map_err(EnforcementError::Fetch)?;

        debug!(
            target: ENFORCEMENT_TARGET,
            item = %item.id,
            flair = ?item.flair_text,
            title = %item.title,
            "Evaluating submission"
        );

        if self.is_tech_support(&item).await? {
            self.comment_and_remove(&item.id, &self.config.tech_support_rr)
                .await?;
            info!(target: ENFORCEMENT_TARGET, item = %item.id, "Removed tech support");
            return Ok(RunOutcome::RemovedTechSupport);
        }

        if !item.has_flair() {
            info!(target: ENFORCEMENT_TARGET, item = %item.id, "Does not have flair");

            wait_until(item.created_at + self.config.time_until_message()).await;

            let warning = self.render_warning(&item);
            // Anchor the grace period to whenever the clock actually started:
            // a prior identical warning means the author was already told,
            // possibly before a restart, and must not have the period reset.
            let anchor = match self
                .dedup
                .has_been_sent(&warning)
                .await
                .map_err(EnforcementError::Fetch)?
            {
                Some(sent_at) => {
                    debug!(target: ENFORCEMENT_TARGET, item = %item.id, "Already sent message");
                    sent_at
                }
                None => {
                    self.gateway
                        .send_direct_message(&item.author, &self.config.add_flair_subject, &warning)
                        .await
                        .map_err(EnforcementError::Action)?;
                    debug!(target: ENFORCEMENT_TARGET, item = %item.id, "Sent message");
                    item.created_at
                }
            };

            wait_until(anchor + self.config.time_until_remove()).await;

            // The author or a moderator may have flaired, approved, or removed
            // the submission while we slept. Never act on a stale snapshot.
            item = self
                .gateway
                .fetch_item(id)
                .await
                .map_err(EnforcementError::Fetch)?;

            if self.is_tech_support(&item).await? {
                self.comment_and_remove(&item.id, &self.config.tech_support_rr)
                    .await?;
                info!(target: ENFORCEMENT_TARGET, item = %item.id, "Removed tech support");
                return Ok(RunOutcome::RemovedTechSupport);
            }

            if !item.has_flair() {
                self.gateway
                    .remove_item_plain(&item.id)
                    .await
                    .map_err(EnforcementError::Action)?;
                info!(target: ENFORCEMENT_TARGET, item = %item.id, "Removed for missing flair");
                return Ok(RunOutcome::RemovedUnflaired);
            }
        }

        if let Some(template_id) = item.flair_template_id.as_deref() {
            if self.config.is_battlestation_flair(template_id) && !created_on_weekend(&item) {
                self.comment_and_remove(&item.id, &self.config.battlestation_rr)
                    .await?;
                info!(target: ENFORCEMENT_TARGET, item = %item.id, "Removed battlestation");
                return Ok(RunOutcome::RemovedBattlestation);
            }
        }

        Ok(RunOutcome::LeftAlone)
    }

    /// Whether the tech-support policy applies to this snapshot.
    ///
    /// Approved submissions and moderator authors are exempt so the bot never
    /// undoes an explicit human moderation decision. The moderator list is
    /// only fetched once the cheaper checks have passed.
    async fn is_tech_support(&self, item: &ItemSnapshot) -> EnforcementResult<bool> {
        if item.flair_template_id.as_deref() != Some(self.config.tech_support_flair.as_str()) {
            return Ok(false);
        }

        if item.approved_by.is_some() {
            return Ok(false);
        }

        let moderators = self
            .gateway
            .list_current_moderators()
            .await
            .map_err(EnforcementError::Fetch)?;

        Ok(!moderators.contains(&item.author))
    }

    /// Post the removal reason's templated message as a stickied moderator
    /// comment, then remove and lock the submission.
    async fn comment_and_remove(&self, id: &ItemId, reason_id: &str) -> EnforcementResult<()> {
        let body = self
            .gateway
            .removal_reason_message(reason_id)
            .await
            .map_err(EnforcementError::Fetch)?;

        let comment = self
            .gateway
            .post_comment(id, &body)
            .await
            .map_err(EnforcementError::Action)?;
        self.gateway
            .distinguish_and_sticky(&comment)
            .await
            .map_err(EnforcementError::Action)?;

        self.gateway
            .remove_item(id, reason_id)
            .await
            .map_err(EnforcementError::Action)?;
        self.gateway
            .lock_item(id)
            .await
            .map_err(EnforcementError::Action)?;

        Ok(())
    }

    /// Render the missing-flair warning body for a submission.
    fn render_warning(&self, item: &ItemSnapshot) -> String {
        self.config
            .add_flair_message
            .replace("{post_url}", &item.permalink)
            .replace(
                "{time_until_remove}",
                &format_duration(self.config.time_until_remove()),
            )
            .trim()
            .to_string()
    }
}

/// Suspend until an absolute deadline, or not at all if it already passed.
async fn wait_until(deadline: DateTime<Utc>) {
    let remaining = deadline - Utc::now();
    // to_std fails on negative durations, which is exactly the skip case
    if let Ok(wait) = remaining.to_std() {
        tokio::time::sleep(wait).await;
    }
}

fn created_on_weekend(item: &ItemSnapshot) -> bool {
    matches!(item.created_at.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Human-readable rendering of a grace period, e.g. "1 day 2 hours".
fn format_duration(duration: Duration) -> String {
    let mut seconds = duration.num_seconds().max(0);
    let days = seconds / 86_400;
    seconds %= 86_400;
    let hours = seconds / 3_600;
    seconds %= 3_600;
    let minutes = seconds / 60;
    seconds %= 60;

    let mut parts = Vec::new();
    for (value, unit) in [
        (days, "day"),
        (hours, "hour"),
        (minutes, "minute"),
        (seconds, "second"),
    ] {
        match value {
            0 => {}
            1 => parts.push(format!("1 {unit}")),
            n => parts.push(format!("{n} {unit}s")),
        }
    }

    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(" ")
    }
}
