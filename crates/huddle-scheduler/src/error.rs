//! Error types for the scheduling core.

use thiserror::Error;

use huddle_slack::MessagingError;
use huddle_store::StoreError;

use crate::CronError;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Messaging error.
    #[error("messaging error: {0}")]
    Messaging(#[from] MessagingError),

    /// Cron expression rejected.
    #[error(transparent)]
    InvalidCron(#[from] CronError),

    /// Form field missing or malformed.
    #[error("invalid form: {0}")]
    InvalidForm(String),

    /// No established connection for the team.
    #[error("no connection for team {0}")]
    NoConnection(String),

    /// Question not found.
    #[error("question not found: {0}")]
    QuestionNotFound(u64),

    /// Question belongs to a different channel.
    #[error("question {id} does not belong to channel {channel}")]
    ChannelMismatch { id: u64, channel: String },
}

impl EngineError {
    /// Whether the bot has permanently lost access to the channel involved.
    pub fn is_access_lost(&self) -> bool {
        matches!(self, EngineError::Messaging(e) if e.is_access_lost())
    }
}
