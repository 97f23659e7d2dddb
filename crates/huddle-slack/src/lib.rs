//! Messaging port for Huddle.
//!
//! The scheduling core talks to chat workspaces only through the
//! [`Messenger`] trait. [`SlackClient`] implements it over the Slack Web API.

mod client;
mod error;
mod messenger;

pub use client::{AuthInfo, DEFAULT_API_URL, SlackClient};
pub use error::{ErrorReason, MessagingError};
pub use messenger::{MembersPage, Messenger, RepliesPage, Reply};
