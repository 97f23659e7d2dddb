//! The messaging port used by the scheduling core.

use async_trait::async_trait;

use crate::MessagingError;

/// A reply posted in a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub user: String,
    pub ts: String,
}

/// One page of thread replies, oldest first, without the parent message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepliesPage {
    pub replies: Vec<Reply>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// One page of channel members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembersPage {
    pub members: Vec<String>,
    pub next_cursor: Option<String>,
}

/// Operations the scheduler needs from a chat workspace.
///
/// Implementations are bound to one workspace (team).
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Post a top-level message, returning its timestamp.
    async fn post_message(&self, channel: &str, text: &str) -> Result<String, MessagingError>;

    /// Replace the text of an existing message.
    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), MessagingError>;

    /// Post a message only `user` can see, optionally inside a thread.
    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), MessagingError>;

    /// List replies to `thread_ts` newer than `oldest`.
    async fn list_replies(
        &self,
        channel: &str,
        thread_ts: &str,
        oldest: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<RepliesPage, MessagingError>;

    /// One page of a channel's member ids.
    async fn channel_members_page(
        &self,
        channel: &str,
        cursor: Option<&str>,
    ) -> Result<MembersPage, MessagingError>;

    /// Human-readable name for a user.
    async fn display_name(&self, user: &str) -> Result<String, MessagingError>;

    /// Every member of a channel, following pagination.
    async fn list_channel_members(&self, channel: &str) -> Result<Vec<String>, MessagingError> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.channel_members_page(channel, cursor.as_deref()).await?;
            members.extend(page.members);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(members)
    }
}
