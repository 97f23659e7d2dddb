//! Operations behind the channel settings page.

use tracing::info;

use huddle_store::{Question, Round};

use crate::{CronExpr, Engine, EngineError};

/// Fields an admin can set on a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionForm {
    pub message: String,
    pub users: Vec<String>,
    pub cron: String,
    pub active: bool,
}

impl QuestionForm {
    /// Check the form and return it with duplicate users removed.
    fn validated(&self) -> Result<QuestionForm, EngineError> {
        if self.message.trim().is_empty() {
            return Err(EngineError::InvalidForm("message is required".to_string()));
        }
        if self.users.is_empty() {
            return Err(EngineError::InvalidForm(
                "at least one user is required".to_string(),
            ));
        }
        CronExpr::parse(&self.cron)?;

        let mut users: Vec<String> = Vec::with_capacity(self.users.len());
        for user in &self.users {
            if !users.contains(user) {
                users.push(user.clone());
            }
        }

        Ok(QuestionForm {
            message: self.message.clone(),
            users,
            cron: self.cron.trim().to_string(),
            active: self.active,
        })
    }
}

/// A channel member as offered on the question form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberChoice {
    pub id: String,
    pub name: String,
    /// Whether the member participates in the question being edited.
    pub selected: bool,
}

impl Engine {
    /// Issue a settings page token for a channel.
    pub fn create_token(&self, team_id: &str, channel: &str) -> String {
        self.tokens().create(team_id, channel)
    }

    /// Check a settings page token.
    pub fn validate_token(&self, team_id: &str, channel: &str, token: &str) -> bool {
        self.tokens().validate(team_id, channel, token)
    }

    /// Questions configured for one channel.
    pub fn list_channel_questions(
        &self,
        team_id: &str,
        channel: &str,
    ) -> Result<Vec<Question>, EngineError> {
        Ok(self.store().questions_for_channel(team_id, channel)?)
    }

    /// Create a question in `channel`.
    pub fn create_question(
        &self,
        team_id: &str,
        channel: &str,
        form: &QuestionForm,
    ) -> Result<Question, EngineError> {
        let form = form.validated()?;
        let mut question = Question {
            id: 0,
            team_id: team_id.to_string(),
            channel: channel.to_string(),
            message: form.message,
            users: form.users,
            cron: form.cron,
            current_round: None,
            active: form.active,
        };

        self.store().save_question(&mut question)?;
        info!(question = question.id, team = %team_id, %channel, "created question");
        Ok(question)
    }

    /// Replace the editable fields of a question in `channel`.
    ///
    /// Open rounds keep the participants they were created with.
    pub fn update_question(
        &self,
        id: u64,
        channel: &str,
        form: &QuestionForm,
    ) -> Result<Question, EngineError> {
        let form = form.validated()?;
        let mut question = self.channel_question(id, channel)?;

        question.message = form.message;
        question.users = form.users;
        question.cron = form.cron;
        question.active = form.active;

        self.store().save_question(&mut question)?;
        info!(question = id, "updated question");
        Ok(question)
    }

    /// Post a new round of a question right away.
    pub async fn invoke_question(&self, id: u64, channel: &str) -> Result<Round, EngineError> {
        let mut question = self.channel_question(id, channel)?;
        self.new_instance(&mut question).await
    }

    /// Delete a question and its rounds.
    pub fn delete_question(&self, id: u64) -> Result<usize, EngineError> {
        if self.store().load_question(id)?.is_none() {
            return Err(EngineError::QuestionNotFound(id));
        }
        Ok(self.store().delete_question(id)?)
    }

    /// Channel members other than the bot, with display names, marking the
    /// participants of `question` as selected.
    pub async fn channel_member_choices(
        &self,
        team_id: &str,
        channel: &str,
        question: Option<&Question>,
    ) -> Result<Vec<MemberChoice>, EngineError> {
        let connection = self.connection(team_id)?;
        let members = connection.messenger.list_channel_members(channel).await?;

        let mut choices = Vec::with_capacity(members.len());
        for id in members {
            if id == connection.bot_user_id {
                continue;
            }
            let name = connection.messenger.display_name(&id).await?;
            let selected = question.is_some_and(|q| q.users.contains(&id));
            choices.push(MemberChoice { id, name, selected });
        }
        Ok(choices)
    }

    fn channel_question(&self, id: u64, channel: &str) -> Result<Question, EngineError> {
        let question = self
            .store()
            .load_question(id)?
            .ok_or(EngineError::QuestionNotFound(id))?;
        if question.channel != channel {
            return Err(EngineError::ChannelMismatch {
                id,
                channel: channel.to_string(),
            });
        }
        Ok(question)
    }
}
