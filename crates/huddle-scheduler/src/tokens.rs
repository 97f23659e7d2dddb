//! Short-lived access tokens for the channel settings page.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct TokenEntry {
    team_id: String,
    channel: String,
    expires_at: Instant,
}

/// Issues and checks tokens scoped to one (team, channel).
#[derive(Debug)]
pub struct TokenRegistry {
    ttl: Duration,
    tokens: DashMap<String, TokenEntry>,
}

impl TokenRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: DashMap::new(),
        }
    }

    /// Issue a new token for `channel` of `team_id`.
    pub fn create(&self, team_id: &str, channel: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(
            token.clone(),
            TokenEntry {
                team_id: team_id.to_string(),
                channel: channel.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// Whether `token` is live and was issued for this team and channel.
    ///
    /// Expired tokens are dropped as a side effect.
    pub fn validate(&self, team_id: &str, channel: &str, token: &str) -> bool {
        self.prune_expired();
        self.tokens
            .get(token)
            .is_some_and(|entry| entry.team_id == team_id && entry.channel == channel)
    }

    /// Drop every expired token, returning how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.tokens.len();
        self.tokens.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.tokens.len());
        if removed > 0 {
            debug!(removed, "pruned expired access tokens");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
