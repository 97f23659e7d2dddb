//! Record types.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant: one chat workspace with its own credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team identifier.
    pub id: String,
    /// Human-readable workspace name.
    pub name: String,
    /// Bot token used to address this workspace.
    pub token: String,
}

/// A recurring question posted to a channel on a cron schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier assigned on first save; `0` means not yet saved.
    pub id: u64,
    /// Owning team. Empty only for records written before teams existed.
    #[serde(default)]
    pub team_id: String,
    /// Channel the question is posted to.
    pub channel: String,
    /// Question text, posted as a quote.
    pub message: String,
    /// Participants expected to reply.
    pub users: Vec<String>,
    /// Five-field cron expression.
    pub cron: String,
    /// Timestamp of the latest round, if any round was created.
    #[serde(default)]
    pub current_round: Option<String>,
    /// Inactive questions never get new rounds.
    pub active: bool,
}

impl Question {
    /// Storage key of this question.
    pub fn storage_key(&self) -> String {
        self.id.to_string()
    }

    /// Key of the latest round.
    pub fn current_round_key(&self) -> Option<RoundKey> {
        self.current_round
            .as_ref()
            .map(|ts| RoundKey::new(&self.channel, ts))
    }

    /// Whether `round` is the latest round of this question.
    pub fn is_current(&self, round: &Round) -> bool {
        round.question_id == self.id
            && round.channel == self.channel
            && self.current_round.as_deref() == Some(round.ts.as_str())
    }
}

/// Identity of a round: the channel plus the timestamp of the posted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundKey {
    pub channel: String,
    pub ts: String,
}

impl RoundKey {
    pub fn new(channel: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ts: ts.into(),
        }
    }

    /// Parse a `{channel}:{ts}` storage key.
    pub fn parse(key: &str) -> Option<Self> {
        let (channel, ts) = key.split_once(':')?;
        if channel.is_empty() || ts.is_empty() {
            return None;
        }
        Some(Self::new(channel, ts))
    }

    /// Storage key of the round.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.channel, self.ts)
    }

    /// When the round's message was posted, from the epoch timestamp in the key.
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        let secs: f64 = self.ts.parse().ok()?;
        if !secs.is_finite() {
            return None;
        }
        DateTime::from_timestamp(secs.trunc() as i64, 0)
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.ts)
    }
}

/// Whether a participant has replied in a round's thread.
///
/// The only transition is `Pending -> Replied`; see [`Round::mark_replied`].
/// Persisted as a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum ResponseState {
    Pending,
    Replied,
}

impl From<bool> for ResponseState {
    fn from(replied: bool) -> Self {
        if replied {
            ResponseState::Replied
        } else {
            ResponseState::Pending
        }
    }
}

impl From<ResponseState> for bool {
    fn from(state: ResponseState) -> Self {
        state == ResponseState::Replied
    }
}

/// Result of recording a reply against a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The participant moved from pending to replied.
    Recorded,
    /// The participant had already replied.
    AlreadyReplied,
    /// The author is not a participant of this round.
    NotParticipant,
}

/// One firing of a question, with its response checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Owning question (resolved by lookup).
    pub question_id: u64,
    /// Channel the round was posted to.
    pub channel: String,
    /// Timestamp of the posted message; empty until posted.
    #[serde(default)]
    pub ts: String,
    /// Participant -> reply state. Keys are fixed at creation.
    responses: BTreeMap<String, ResponseState>,
    /// Timestamp of the newest reply already folded into `responses`.
    #[serde(default)]
    pub last_seen: Option<String>,
    /// Greeting chosen when the round was created.
    #[serde(default)]
    pub greeting: String,
}

impl Round {
    /// Create an unposted round with every participant pending.
    pub fn new<I, S>(
        question_id: u64,
        channel: impl Into<String>,
        participants: I,
        greeting: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            question_id,
            channel: channel.into(),
            ts: String::new(),
            responses: participants
                .into_iter()
                .map(|p| (p.into(), ResponseState::Pending))
                .collect(),
            last_seen: None,
            greeting: greeting.into(),
        }
    }

    /// Key of this round.
    pub fn key(&self) -> RoundKey {
        RoundKey::new(&self.channel, &self.ts)
    }

    /// Whether the round's message has been posted.
    pub fn is_posted(&self) -> bool {
        !self.ts.is_empty()
    }

    /// Reply state per participant, in participant order.
    pub fn responses(&self) -> &BTreeMap<String, ResponseState> {
        &self.responses
    }

    /// Reply state of one participant.
    pub fn state_of(&self, user: &str) -> Option<ResponseState> {
        self.responses.get(user).copied()
    }

    /// Record a reply from `user`. Never adds participants and never
    /// moves a participant back to pending.
    pub fn mark_replied(&mut self, user: &str) -> ReplyOutcome {
        match self.responses.get_mut(user) {
            None => ReplyOutcome::NotParticipant,
            Some(ResponseState::Replied) => ReplyOutcome::AlreadyReplied,
            Some(state) => {
                *state = ResponseState::Replied;
                ReplyOutcome::Recorded
            }
        }
    }

    /// Participants who replied.
    pub fn replied(&self) -> impl Iterator<Item = &str> {
        self.responses
            .iter()
            .filter(|(_, s)| **s == ResponseState::Replied)
            .map(|(u, _)| u.as_str())
    }

    /// Participants still pending.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.responses
            .iter()
            .filter(|(_, s)| **s == ResponseState::Pending)
            .map(|(u, _)| u.as_str())
    }

    /// A round is resolved once every participant replied.
    pub fn is_resolved(&self) -> bool {
        self.pending().next().is_none()
    }

    /// Move the last-seen marker to `ts` if it is newer. Returns whether it moved.
    ///
    /// Polling starts after this marker, so a reply older than one delivered
    /// by push is never fetched if its own push was lost.
    pub fn advance_last_seen(&mut self, ts: &str) -> bool {
        let newer = match &self.last_seen {
            None => true,
            Some(current) => compare_ts(ts, current) == Ordering::Greater,
        };
        if newer {
            self.last_seen = Some(ts.to_string());
        }
        newer
    }
}

/// Compare two `seconds.micros` message timestamps numerically.
///
/// Falls back to string order for values that are not timestamps.
pub fn compare_ts(a: &str, b: &str) -> Ordering {
    fn parts(ts: &str) -> Option<(u64, String)> {
        let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((secs.parse().ok()?, format!("{:0<9}", frac)))
    }

    match (parts(a), parts(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round(users: &[&str]) -> Round {
        Round::new(1, "C1", users.iter().copied(), "Hello!")
    }

    #[test]
    fn test_new_round_all_pending() {
        let r = round(&["u2", "u1"]);
        assert_eq!(r.state_of("u1"), Some(ResponseState::Pending));
        assert_eq!(r.state_of("u2"), Some(ResponseState::Pending));
        assert_eq!(r.state_of("u3"), None);
        assert!(!r.is_resolved());
        assert!(!r.is_posted());
    }

    #[test]
    fn test_duplicate_participants_collapse() {
        let r = round(&["u1", "u1", "u2"]);
        assert_eq!(r.responses().len(), 2);
    }

    #[test]
    fn test_mark_replied_transitions() {
        let mut r = round(&["u1", "u2"]);
        assert_eq!(r.mark_replied("u1"), ReplyOutcome::Recorded);
        assert_eq!(r.mark_replied("u1"), ReplyOutcome::AlreadyReplied);
        assert_eq!(r.mark_replied("stranger"), ReplyOutcome::NotParticipant);
        assert_eq!(r.responses().len(), 2);
        assert!(!r.is_resolved());

        assert_eq!(r.mark_replied("u2"), ReplyOutcome::Recorded);
        assert!(r.is_resolved());
    }

    #[test]
    fn test_empty_round_is_resolved() {
        let r = round(&[]);
        assert!(r.is_resolved());
    }

    #[test]
    fn test_responses_persist_as_booleans() {
        let mut r = round(&["u1", "u2"]);
        r.ts = "1700000000.000100".to_string();
        r.mark_replied("u2");

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(
            json["responses"],
            serde_json::json!({"u1": false, "u2": true})
        );

        let decoded: Round = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, r);
    }

    #[test]
    fn test_round_key_roundtrip() {
        let key = RoundKey::new("C123", "1700000000.000100");
        assert_eq!(key.storage_key(), "C123:1700000000.000100");
        assert_eq!(RoundKey::parse(&key.storage_key()), Some(key));
        assert_eq!(RoundKey::parse("no-separator"), None);
        assert_eq!(RoundKey::parse("C1:"), None);
    }

    #[test]
    fn test_posted_at() {
        let key = RoundKey::new("C1", "1700000000.000100");
        assert_eq!(key.posted_at().unwrap().timestamp(), 1_700_000_000);
        assert!(RoundKey::new("C1", "garbage").posted_at().is_none());
    }

    #[test]
    fn test_compare_ts_numeric() {
        assert_eq!(compare_ts("9.000001", "10.000000"), Ordering::Less);
        assert_eq!(compare_ts("10.000002", "10.000001"), Ordering::Greater);
        assert_eq!(compare_ts("10.5", "10.500000"), Ordering::Equal);
        assert_eq!(compare_ts("10.5", "10.000005"), Ordering::Greater);
    }

    #[test]
    fn test_advance_last_seen_only_forward() {
        let mut r = round(&["u1"]);
        assert!(r.advance_last_seen("100.000002"));
        assert!(!r.advance_last_seen("100.000001"));
        assert!(!r.advance_last_seen("100.000002"));
        assert!(r.advance_last_seen("101.000000"));
        assert_eq!(r.last_seen.as_deref(), Some("101.000000"));
    }

    #[test]
    fn test_question_is_current() {
        let mut q = Question {
            id: 7,
            team_id: "T1".to_string(),
            channel: "C1".to_string(),
            message: "How is it going?".to_string(),
            users: vec!["u1".to_string()],
            cron: "* * * * *".to_string(),
            current_round: None,
            active: true,
        };
        let mut r = Round::new(7, "C1", ["u1"], "Hi");
        r.ts = "100.000001".to_string();
        assert!(!q.is_current(&r));

        q.current_round = Some("100.000001".to_string());
        assert!(q.is_current(&r));
        assert_eq!(q.current_round_key(), Some(r.key()));
    }

    proptest! {
        // Replies never change the participant set and never un-reply anyone
        #[test]
        fn replies_keep_keys_and_are_monotonic(
            users in prop::collection::btree_set("[a-z]{1,4}", 0..6),
            replies in prop::collection::vec("[a-z]{1,4}", 0..20),
        ) {
            let mut r = Round::new(1, "C1", users.iter().cloned(), "Hi");
            let keys: Vec<String> = r.responses().keys().cloned().collect();

            let mut replied_so_far = std::collections::BTreeSet::new();
            for user in &replies {
                r.mark_replied(user);
                if users.contains(user) {
                    replied_so_far.insert(user.clone());
                }

                let now_keys: Vec<String> = r.responses().keys().cloned().collect();
                prop_assert_eq!(&now_keys, &keys);
                for done in &replied_so_far {
                    prop_assert_eq!(r.state_of(done), Some(ResponseState::Replied));
                }
            }

            prop_assert_eq!(r.is_resolved(), replied_so_far.len() == users.len());
        }
    }
}
