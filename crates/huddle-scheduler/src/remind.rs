//! Reminders for participants who have not replied.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::{Engine, EngineError};

/// Outcome of one reminder sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemindReport {
    /// Reminder messages delivered.
    pub sent: usize,
    /// Reminder messages that failed to send.
    pub failed: usize,
}

/// Text of the reminder listing the channels a user still owes an update in.
pub fn reminder_text(channels: &[String]) -> String {
    let mentions = channels
        .iter()
        .map(|c| format!("<#{}>", c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Hi, you haven't posted in my update thread in these channels yet:\n{}\nPlease take a minute to fill in your answers 😇",
        mentions
    )
}

impl Engine {
    /// Send one reminder per user per team for every current round older
    /// than the cooldown in which they are still pending.
    #[tracing::instrument(skip(self))]
    pub async fn remind_missing(&self, now: DateTime<Utc>) -> Result<RemindReport, EngineError> {
        let questions: HashMap<u64, _> = self
            .store()
            .list_questions()?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();
        let rounds = self.store().list_rounds()?;
        let cooldown = self.config().reminder_cooldown;

        // team -> user -> channels
        let mut missing: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();

        for round in rounds {
            let key = round.key();
            let Some(question) = questions.get(&round.question_id) else {
                debug!(round = %key, "skipping orphaned round");
                continue;
            };

            if !question.is_current(&round) {
                debug!(round = %key, current = ?question.current_round, "skipping stale round");
                continue;
            }

            let Some(posted_at) = key.posted_at() else {
                error!(round = %key, "cannot parse round timestamp");
                continue;
            };

            let old_enough = (now - posted_at)
                .to_std()
                .is_ok_and(|age| age >= cooldown);
            if !old_enough {
                debug!(round = %key, "skipping round younger than cooldown");
                continue;
            }

            for user in round.pending() {
                missing
                    .entry(question.team_id.clone())
                    .or_default()
                    .entry(user.to_string())
                    .or_default()
                    .push(round.channel.clone());
            }
        }

        let mut report = RemindReport::default();
        for (team_id, users) in missing {
            let Some(connection) = self.teams().get(&team_id) else {
                error!(team = %team_id, "not reminding team without a connection");
                continue;
            };

            for (user, channels) in users {
                info!(team = %team_id, %user, ?channels, "reminding user");
                match connection
                    .messenger
                    .post_message(&user, &reminder_text(&channels))
                    .await
                {
                    Ok(_) => report.sent += 1,
                    Err(e) => {
                        report.failed += 1;
                        error!(team = %team_id, %user, error = %e, "could not send reminder");
                    }
                }
            }
        }

        Ok(report)
    }
}
