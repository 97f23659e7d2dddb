//! Round creation, rendering and reply handling.

use rand::seq::SliceRandom;
use tracing::{debug, info};

use huddle_slack::Messenger;
use huddle_store::{Question, ReplyOutcome, Round};

use crate::{Engine, EngineError};

/// Greetings opening each round. One is picked per round and kept.
pub const GREETINGS: &[&str] = &[
    "Hi everyone!",
    "Hello there!",
    "Howdy!",
    "Bonjour!",
    "I'm back.",
    "Fresh off the press: a new issue of the weekly digest.",
    "My time has come again.",
    "Time for our regular update.",
    "Long time no see.",
];

/// Posted once every participant has replied.
pub const CELEBRATION: &str = "🎉 Everyone has posted their update, woohoo!";

/// Ephemeral thank-you sent to a participant after their first reply.
pub const ACKNOWLEDGEMENT: &str = "Thank you! ❤️";

fn choose_greeting() -> String {
    GREETINGS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Hello!")
        .to_string()
}

fn mentions<'a>(users: impl Iterator<Item = &'a str>) -> String {
    users
        .map(|u| format!("<@{}>", u))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render the text of a round's message.
pub fn render_round(template: &str, round: &Round) -> String {
    let mut lines = vec![
        format!("👋 {}", round.greeting),
        String::new(),
        format!("> {}", template.replace('\n', "\n> ")),
        String::new(),
    ];

    if round.is_resolved() {
        lines.push(CELEBRATION.to_string());
    } else {
        lines.push(format!("❌: {}", mentions(round.pending())));
        lines.push(format!("✅: {}", mentions(round.replied())));
    }

    lines.join("\n")
}

impl Engine {
    /// Post a new round of `question` and make it the question's current round.
    #[tracing::instrument(skip(self, question), fields(question = question.id, channel = %question.channel))]
    pub async fn new_instance(&self, question: &mut Question) -> Result<Round, EngineError> {
        let connection = self.connection(&question.team_id)?;

        let mut round = Round::new(
            question.id,
            &question.channel,
            question.users.iter().cloned(),
            choose_greeting(),
        );

        let text = render_round(&question.message, &round);
        round.ts = connection
            .messenger
            .post_message(&question.channel, &text)
            .await?;

        self.store().save_round(&round)?;

        question.current_round = Some(round.ts.clone());
        self.store().save_question(question)?;

        info!(question = question.id, round = %round.key(), "created round");
        Ok(round)
    }

    /// Fold one thread reply into `round`.
    ///
    /// A first reply from a pending participant is persisted, then the round
    /// message is re-rendered and the participant gets an acknowledgement.
    /// Anything else only advances the last-seen marker.
    pub async fn handle_reply(
        &self,
        messenger: &dyn Messenger,
        question: &Question,
        round: &mut Round,
        user: &str,
        ts: &str,
    ) -> Result<ReplyOutcome, EngineError> {
        let advanced = round.advance_last_seen(ts);
        let outcome = round.mark_replied(user);

        if outcome != ReplyOutcome::Recorded {
            debug!(round = %round.key(), %user, ?outcome, "reply changes nothing");
            if advanced {
                self.store().save_round(round)?;
            }
            return Ok(outcome);
        }

        self.store().save_round(round)?;
        info!(round = %round.key(), %user, "recorded reply");

        let text = render_round(&question.message, round);
        messenger
            .update_message(&round.channel, &round.ts, &text)
            .await?;
        messenger
            .post_ephemeral(&round.channel, user, ACKNOWLEDGEMENT, Some(round.ts.as_str()))
            .await?;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round(users: &[&str]) -> Round {
        Round::new(1, "C1", users.iter().copied(), "Howdy!")
    }

    #[test]
    fn test_render_open_round() {
        let mut r = round(&["u1", "u2", "u3"]);
        r.mark_replied("u2");

        insta::assert_snapshot!(render_round("What did you do?\nWhat's next?", &r), @r"
        👋 Howdy!

        > What did you do?
        > What's next?

        ❌: <@u1>, <@u3>
        ✅: <@u2>
        ");
    }

    #[test]
    fn test_render_nobody_replied() {
        let r = round(&["u1", "u2"]);
        let text = render_round("Status?", &r);
        assert!(text.ends_with("❌: <@u1>, <@u2>\n✅: "));
    }

    #[test]
    fn test_render_resolved_round() {
        let mut r = round(&["u1", "u2"]);
        r.mark_replied("u1");
        r.mark_replied("u2");

        let text = render_round("Status?", &r);
        assert_eq!(text, format!("👋 Howdy!\n\n> Status?\n\n{}", CELEBRATION));
        assert!(!text.contains("❌"));
        assert!(!text.contains("✅"));
    }

    #[test]
    fn test_greeting_comes_from_list() {
        for _ in 0..20 {
            assert!(GREETINGS.contains(&choose_greeting().as_str()));
        }
    }

    proptest! {
        #[test]
        fn prop_render_lists_every_participant_once(
            users in proptest::collection::btree_set("[a-z]{1,6}", 1..6),
            replied in proptest::collection::vec(any::<bool>(), 6),
        ) {
            let mut r = round(&users.iter().map(String::as_str).collect::<Vec<_>>());
            for (user, yes) in users.iter().zip(&replied) {
                if *yes {
                    r.mark_replied(user);
                }
            }

            let text = render_round("Q", &r);
            if r.is_resolved() {
                prop_assert!(text.ends_with(CELEBRATION));
            } else {
                for user in &users {
                    let mention = format!("<@{}>", user);
                    prop_assert_eq!(text.matches(&mention).count(), 1);
                }
            }
        }
    }
}
