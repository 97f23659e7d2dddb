//! Callbacks for events pushed by the chat platform.

use tracing::{debug, error, info, warn};

use huddle_store::{ReplyOutcome, RoundKey};

use crate::{Engine, EngineError};

/// A message posted in a channel the bot can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel: String,
    pub user: String,
    pub ts: String,
    /// Parent message of the thread, when posted in a thread.
    pub thread_ts: Option<String>,
}

/// An invocation of the bot's slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub channel: String,
    pub user: String,
}

impl Engine {
    /// Handle a message delivered by the platform.
    ///
    /// Returns `None` when the message is not a reply to one of our rounds.
    pub async fn handle_message_event(
        &self,
        team_id: &str,
        event: &MessageEvent,
    ) -> Result<Option<ReplyOutcome>, EngineError> {
        let connection = self.connection(team_id)?;

        if event.user == connection.bot_user_id {
            debug!(channel = %event.channel, ts = %event.ts, "ignoring message from myself");
            return Ok(None);
        }

        let Some(thread_ts) = event.thread_ts.as_deref().filter(|t| *t != event.ts) else {
            debug!(channel = %event.channel, ts = %event.ts, "ignoring non-thread message");
            return Ok(None);
        };

        let Some(mut round) = self
            .store()
            .load_round(&RoundKey::new(&event.channel, thread_ts))?
        else {
            debug!(channel = %event.channel, thread = %thread_ts, "ignoring reply to unrelated thread");
            return Ok(None);
        };

        let Some(question) = self.store().load_question(round.question_id)? else {
            debug!(round = %round.key(), "ignoring reply to orphaned round");
            return Ok(None);
        };

        let outcome = self
            .handle_reply(
                connection.messenger.as_ref(),
                &question,
                &mut round,
                &event.user,
                &event.ts,
            )
            .await?;
        Ok(Some(outcome))
    }

    /// Retire every question of an archived channel.
    ///
    /// Returns the number of questions deleted.
    pub async fn handle_channel_archived(
        &self,
        team_id: &str,
        channel: &str,
    ) -> Result<usize, EngineError> {
        let questions = self.store().questions_for_channel(team_id, channel)?;
        for question in &questions {
            self.store().delete_question(question.id)?;
        }
        info!(team = %team_id, %channel, count = questions.len(), "channel archived, deleted its questions");
        Ok(questions.len())
    }

    /// Reply to the slash command with a link to the channel settings.
    ///
    /// When the bot is not in the channel, the invoking user gets a direct
    /// message explaining that it has to be added first.
    pub async fn handle_command(
        &self,
        team_id: &str,
        command: &SlashCommand,
    ) -> Result<(), EngineError> {
        let connection = self.connection(team_id)?;
        let token = self.tokens().create(team_id, &command.channel);
        let text = format!(
            "Settings for this channel are here: {}/{}/{}/{}/",
            self.config().root_url.trim_end_matches('/'),
            team_id,
            command.channel,
            token
        );

        let Err(e) = connection
            .messenger
            .post_ephemeral(&command.channel, &command.user, &text, None)
            .await
        else {
            return Ok(());
        };

        if !e.is_access_lost() {
            error!(channel = %command.channel, error = %e, "could not send command reply");
            return Err(e.into());
        }

        warn!(
            channel = %command.channel,
            user = %command.user,
            "received command from a channel I am not in"
        );
        let notice = format!(
            "⚠️ Before you can use `/{}` in a channel, you need to add me to it.",
            self.config().command
        );
        connection
            .messenger
            .post_message(&command.user, &notice)
            .await?;
        Ok(())
    }
}
