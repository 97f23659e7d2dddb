//! Per-team connections.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use huddle_slack::Messenger;

/// An established connection to one team.
#[derive(Clone)]
pub struct TeamConnection {
    pub messenger: Arc<dyn Messenger>,
    /// The bot's own user id in this team.
    pub bot_user_id: String,
}

impl TeamConnection {
    pub fn new(messenger: Arc<dyn Messenger>, bot_user_id: impl Into<String>) -> Self {
        Self {
            messenger,
            bot_user_id: bot_user_id.into(),
        }
    }
}

impl fmt::Debug for TeamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeamConnection")
            .field("bot_user_id", &self.bot_user_id)
            .finish_non_exhaustive()
    }
}

/// Team id -> connection, safe to share between sweeps and onboarding.
#[derive(Debug, Default)]
pub struct TeamRegistry {
    teams: DashMap<String, TeamConnection>,
}

impl TeamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, replacing any previous one for the team.
    pub fn register(&self, team_id: impl Into<String>, connection: TeamConnection) {
        self.teams.insert(team_id.into(), connection);
    }

    pub fn get(&self, team_id: &str) -> Option<TeamConnection> {
        self.teams.get(team_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, team_id: &str) -> Option<TeamConnection> {
        self.teams.remove(team_id).map(|(_, connection)| connection)
    }

    /// Connected team ids, sorted.
    pub fn team_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.teams.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}
