//! Shared fixtures: a recording messenger and engine helpers.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use huddle_scheduler::{Engine, EngineConfig, QuestionForm, TeamConnection};
use huddle_slack::{ErrorReason, MembersPage, Messenger, MessagingError, RepliesPage, Reply};
use huddle_store::{Question, Store, compare_ts};

pub const TEAM: &str = "T1";
pub const BOT: &str = "UBOT";

/// Epoch seconds used for message timestamps until the clock is moved.
pub const START: i64 = 1_700_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    pub channel: String,
    pub text: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Updated {
    pub channel: String,
    pub ts: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ephemeral {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub thread_ts: Option<String>,
}

#[derive(Debug)]
struct State {
    clock: i64,
    seq: u64,
    page_size: usize,
    posts: Vec<Posted>,
    updates: Vec<Updated>,
    ephemerals: Vec<Ephemeral>,
    reply_queries: Vec<(String, String, Option<String>)>,
    threads: HashMap<(String, String), Vec<Reply>>,
    failures: HashMap<String, ErrorReason>,
    members: HashMap<String, Vec<String>>,
    names: HashMap<String, String>,
}

/// A [`Messenger`] that records every call and serves replies from memory.
#[derive(Debug)]
pub struct FakeMessenger {
    state: Mutex<State>,
}

impl Default for FakeMessenger {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                clock: START,
                seq: 0,
                page_size: 2,
                posts: Vec::new(),
                updates: Vec::new(),
                ephemerals: Vec::new(),
                reply_queries: Vec::new(),
                threads: HashMap::new(),
                failures: HashMap::new(),
                members: HashMap::new(),
                names: HashMap::new(),
            }),
        }
    }
}

impl FakeMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Set the epoch seconds used for the next message timestamps.
    pub fn set_clock(&self, secs: i64) {
        self.state().clock = secs;
    }

    /// Make every call touching `channel` fail with `reason`.
    pub fn fail_channel(&self, channel: &str, reason: ErrorReason) {
        self.state().failures.insert(channel.to_string(), reason);
    }

    pub fn heal_channel(&self, channel: &str) {
        self.state().failures.remove(channel);
    }

    /// Add a reply to a thread, returning its timestamp.
    pub fn add_reply(&self, channel: &str, thread_ts: &str, user: &str) -> String {
        let mut state = self.state();
        state.seq += 1;
        let ts = format!("{}.{:06}", state.clock, state.seq);
        state
            .threads
            .entry((channel.to_string(), thread_ts.to_string()))
            .or_default()
            .push(Reply {
                user: user.to_string(),
                ts: ts.clone(),
            });
        ts
    }

    pub fn set_members(&self, channel: &str, members: &[&str]) {
        self.state().members.insert(
            channel.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
    }

    pub fn set_name(&self, user: &str, name: &str) {
        self.state().names.insert(user.to_string(), name.to_string());
    }

    pub fn posts(&self) -> Vec<Posted> {
        self.state().posts.clone()
    }

    /// Posts addressed to a user rather than a channel. Channel ids start
    /// with `C`.
    pub fn direct_messages(&self) -> Vec<Posted> {
        self.posts()
            .into_iter()
            .filter(|p| !p.channel.starts_with('C'))
            .collect()
    }

    pub fn updates(&self) -> Vec<Updated> {
        self.state().updates.clone()
    }

    pub fn ephemerals(&self) -> Vec<Ephemeral> {
        self.state().ephemerals.clone()
    }

    /// `(channel, thread_ts, oldest)` of every reply listing.
    pub fn reply_queries(&self) -> Vec<(String, String, Option<String>)> {
        self.state().reply_queries.clone()
    }

    fn check(&self, channel: &str) -> Result<(), MessagingError> {
        match self.state().failures.get(channel) {
            Some(reason) => Err(MessagingError::new(*reason, format!("{} failed", channel))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn post_message(&self, channel: &str, text: &str) -> Result<String, MessagingError> {
        self.check(channel)?;
        let mut state = self.state();
        state.seq += 1;
        let ts = format!("{}.{:06}", state.clock, state.seq);
        state.posts.push(Posted {
            channel: channel.to_string(),
            text: text.to_string(),
            ts: ts.clone(),
        });
        Ok(ts)
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), MessagingError> {
        self.check(channel)?;
        self.state().updates.push(Updated {
            channel: channel.to_string(),
            ts: ts.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<(), MessagingError> {
        self.check(channel)?;
        self.state().ephemerals.push(Ephemeral {
            channel: channel.to_string(),
            user: user.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.map(str::to_string),
        });
        Ok(())
    }

    async fn list_replies(
        &self,
        channel: &str,
        thread_ts: &str,
        oldest: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<RepliesPage, MessagingError> {
        self.check(channel)?;
        let mut state = self.state();
        state.reply_queries.push((
            channel.to_string(),
            thread_ts.to_string(),
            oldest.map(str::to_string),
        ));

        let newer: Vec<Reply> = state
            .threads
            .get(&(channel.to_string(), thread_ts.to_string()))
            .map(|replies| {
                replies
                    .iter()
                    .filter(|r| oldest.is_none_or(|o| compare_ts(&r.ts, o) == Ordering::Greater))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + state.page_size).min(newer.len());
        let has_more = end < newer.len();

        Ok(RepliesPage {
            replies: newer.get(start..end).unwrap_or_default().to_vec(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    async fn channel_members_page(
        &self,
        channel: &str,
        cursor: Option<&str>,
    ) -> Result<MembersPage, MessagingError> {
        self.check(channel)?;
        let state = self.state();
        let members = state.members.get(channel).cloned().unwrap_or_default();

        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + state.page_size).min(members.len());
        Ok(MembersPage {
            members: members.get(start..end).unwrap_or_default().to_vec(),
            next_cursor: (end < members.len()).then(|| end.to_string()),
        })
    }

    async fn display_name(&self, user: &str) -> Result<String, MessagingError> {
        Ok(self
            .state()
            .names
            .get(user)
            .cloned()
            .unwrap_or_else(|| user.to_string()))
    }
}

/// An engine over an in-memory store with `fake` connected as team [`TEAM`].
pub fn engine_with(fake: &Arc<FakeMessenger>) -> Engine {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let engine = Engine::new(
        store,
        EngineConfig {
            root_url: "https://huddle.example".to_string(),
            ..EngineConfig::default()
        },
    );
    engine
        .teams()
        .register(TEAM, TeamConnection::new(fake.clone(), BOT));
    engine
}

pub fn form(users: &[&str], cron: &str) -> QuestionForm {
    QuestionForm {
        message: "What did you work on?".to_string(),
        users: users.iter().map(|u| u.to_string()).collect(),
        cron: cron.to_string(),
        active: true,
    }
}

/// Create an active question in `channel` of [`TEAM`].
pub fn question(engine: &Engine, channel: &str, users: &[&str], cron: &str) -> Question {
    engine
        .create_question(TEAM, channel, &form(users, cron))
        .unwrap()
}
