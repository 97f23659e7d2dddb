//! Error types for the messaging port.

use std::fmt;

use thiserror::Error;

/// Why a messaging call failed, as far as callers need to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    /// Network failure, timeout, rate limit or server-side error.
    Transient,
    /// The bot is not a member of the channel.
    NotInChannel,
    /// The channel does not exist or was archived.
    ChannelNotFound,
    /// Any other API failure.
    Other,
}

impl ErrorReason {
    /// Map a Slack API error code to a reason.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not_in_channel" => ErrorReason::NotInChannel,
            "channel_not_found" | "is_archived" => ErrorReason::ChannelNotFound,
            "ratelimited" | "internal_error" | "fatal_error" | "service_unavailable"
            | "request_timeout" => ErrorReason::Transient,
            _ => ErrorReason::Other,
        }
    }

    /// Whether the bot has permanently lost access to the channel.
    pub fn is_access_lost(self) -> bool {
        matches!(self, ErrorReason::NotInChannel | ErrorReason::ChannelNotFound)
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorReason::Transient => "transient",
            ErrorReason::NotInChannel => "not_in_channel",
            ErrorReason::ChannelNotFound => "channel_not_found",
            ErrorReason::Other => "other",
        };
        f.write_str(s)
    }
}

/// A failed messaging call, tagged with its [`ErrorReason`].
#[derive(Debug, Error)]
#[error("{reason}: {message}")]
pub struct MessagingError {
    pub reason: ErrorReason,
    pub message: String,
}

impl MessagingError {
    pub fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    /// Network-level or retryable failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::Transient, message)
    }

    /// Failure reported by the API with an error code.
    pub fn api(code: &str) -> Self {
        Self::new(ErrorReason::from_code(code), code)
    }

    /// Whether the bot has permanently lost access to the channel.
    pub fn is_access_lost(&self) -> bool {
        self.reason.is_access_lost()
    }
}

impl From<reqwest::Error> for MessagingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::new(ErrorReason::Other, format!("invalid response: {}", err))
        } else {
            Self::transient(format!("HTTP error: {}", err))
        }
    }
}
