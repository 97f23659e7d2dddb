//! Pull-based reconciliation of thread replies.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use huddle_slack::Messenger;
use huddle_store::{Question, ReplyOutcome, Round};

use crate::{Engine, EngineError};

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Rounds whose thread was polled.
    pub rounds_checked: usize,
    /// Replies newly recorded.
    pub replies_recorded: usize,
    /// Questions deleted because the bot lost access to their channel.
    pub questions_retired: Vec<u64>,
}

impl Engine {
    /// Poll every open round for replies missed by push delivery.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<ReconcileReport, EngineError> {
        let rounds = self.store().list_rounds()?;
        let mut report = ReconcileReport::default();
        let mut retired = HashSet::new();

        for mut round in rounds {
            let key = round.key();

            if retired.contains(&round.question_id) {
                continue;
            }

            let question = match self.store().load_question(round.question_id) {
                Ok(Some(question)) => question,
                Ok(None) => {
                    debug!(round = %key, question = round.question_id, "skipping orphaned round");
                    continue;
                }
                Err(e) => {
                    error!(round = %key, error = %e, "could not load question");
                    continue;
                }
            };

            if round.is_resolved() {
                continue;
            }

            let Some(connection) = self.teams().get(&question.team_id) else {
                warn!(round = %key, team = %question.team_id, "no connection for team");
                continue;
            };

            report.rounds_checked += 1;
            match self
                .reconcile_round(connection.messenger.as_ref(), &question, &mut round)
                .await
            {
                Ok(recorded) => report.replies_recorded += recorded,
                Err(e) if e.is_access_lost() => {
                    info!(
                        question = question.id,
                        channel = %question.channel,
                        error = %e,
                        "lost access to channel, retiring question"
                    );
                    match self.store().delete_question(question.id) {
                        Ok(_) => {
                            retired.insert(question.id);
                            report.questions_retired.push(question.id);
                        }
                        Err(e) => error!(question = question.id, error = %e, "could not delete question"),
                    }
                }
                Err(e) => error!(round = %key, error = %e, "could not check new replies"),
            }
        }

        debug!(?report, "reconciliation finished");
        Ok(report)
    }

    /// Fetch every reply newer than the round's last-seen marker and fold
    /// them in. Returns the number of replies recorded.
    async fn reconcile_round(
        &self,
        messenger: &dyn Messenger,
        question: &Question,
        round: &mut Round,
    ) -> Result<usize, EngineError> {
        let oldest = round.last_seen.clone();
        let thread_ts = round.ts.clone();
        let mut cursor: Option<String> = None;
        let mut recorded = 0;

        loop {
            let page = messenger
                .list_replies(
                    &round.channel,
                    &thread_ts,
                    oldest.as_deref(),
                    cursor.as_deref(),
                )
                .await?;

            for reply in &page.replies {
                let outcome = self
                    .handle_reply(messenger, question, round, &reply.user, &reply.ts)
                    .await?;
                if outcome == ReplyOutcome::Recorded {
                    recorded += 1;
                }
            }

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(recorded)
    }
}
