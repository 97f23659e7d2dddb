//! Shared context for every sweep and callback.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use huddle_slack::{AuthInfo, SlackClient};
use huddle_store::{Store, Team};

use crate::{EngineError, TeamConnection, TeamRegistry, TokenRegistry};

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the channel settings page.
    pub root_url: String,
    /// How long a round stays open before its stragglers are reminded.
    pub reminder_cooldown: Duration,
    /// Lifetime of settings page access tokens.
    pub token_ttl: Duration,
    /// Slash command name, without the leading slash.
    pub command: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_url: "http://localhost:8080".to_string(),
            reminder_cooldown: Duration::from_secs(24 * 60 * 60),
            token_ttl: Duration::from_secs(60 * 60),
            command: "huddle".to_string(),
        }
    }
}

/// Store, team connections and tokens, constructed once at startup.
#[derive(Clone)]
pub struct Engine {
    store: Arc<Store>,
    teams: Arc<TeamRegistry>,
    tokens: Arc<TokenRegistry>,
    config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(store: Arc<Store>, config: EngineConfig) -> Self {
        Self {
            store,
            teams: Arc::new(TeamRegistry::new()),
            tokens: Arc::new(TokenRegistry::new(config.token_ttl)),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn teams(&self) -> &TeamRegistry {
        &self.teams
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Connection for `team_id`, or [`EngineError::NoConnection`].
    pub fn connection(&self, team_id: &str) -> Result<TeamConnection, EngineError> {
        self.teams
            .get(team_id)
            .ok_or_else(|| EngineError::NoConnection(team_id.to_string()))
    }

    /// Verify a team's token against the Slack API at `base_url` and register
    /// the connection.
    #[tracing::instrument(skip(self, team), fields(team = %team.id))]
    pub async fn connect_team(&self, team: &Team, base_url: &str) -> Result<AuthInfo, EngineError> {
        let client = SlackClient::with_base_url(&team.token, base_url)?;
        let auth = client.auth_test().await?;

        if auth.team_id != team.id {
            warn!(
                team = %team.id,
                reported = %auth.team_id,
                "token belongs to a different team than recorded"
            );
        }

        self.teams
            .register(&team.id, TeamConnection::new(Arc::new(client), &auth.user_id));
        info!(team = %team.id, bot_user = %auth.user_id, "connected team");
        Ok(auth)
    }

    /// Connect every stored team. Teams that fail to connect are logged and
    /// skipped. Returns the number of connected teams.
    pub async fn connect_all(&self, base_url: &str) -> Result<usize, EngineError> {
        let teams = self.store.list_teams()?;
        let mut connected = 0;
        for team in &teams {
            match self.connect_team(team, base_url).await {
                Ok(_) => connected += 1,
                Err(e) => error!(team = %team.id, error = %e, "could not connect team"),
            }
        }
        Ok(connected)
    }
}
