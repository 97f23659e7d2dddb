//! Typed record operations on top of the key-value store.

use tracing::{debug, info};

use crate::{Partition, Question, Round, RoundKey, Store, StoreError, Team};

impl Store {
    // =========================================================================
    // Teams
    // =========================================================================

    /// Insert or replace a team.
    pub fn save_team(&self, team: &Team) -> Result<(), StoreError> {
        self.update(|tx| tx.put_json(Partition::Teams, &team.id, team))
    }

    /// Load a team by id.
    pub fn load_team(&self, id: &str) -> Result<Option<Team>, StoreError> {
        self.view(|tx| tx.get_json(Partition::Teams, id))
    }

    /// All teams, ordered by id.
    pub fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        self.view(|tx| tx.scan_json::<Team>(Partition::Teams))
            .map(|rows| rows.into_iter().map(|(_, team)| team).collect())
    }

    // =========================================================================
    // Questions
    // =========================================================================

    /// Insert or replace a question, assigning an id on first save.
    #[tracing::instrument(skip(self, question), fields(question = question.id))]
    pub fn save_question(&self, question: &mut Question) -> Result<(), StoreError> {
        let id = self.update(|tx| {
            let mut record = question.clone();
            if record.id == 0 {
                record.id = tx.next_sequence(Partition::Questions)?;
            }
            tx.put_json(Partition::Questions, &record.storage_key(), &record)?;
            Ok(record.id)
        })?;

        question.id = id;
        Ok(())
    }

    /// Load a question by id.
    pub fn load_question(&self, id: u64) -> Result<Option<Question>, StoreError> {
        self.view(|tx| tx.get_json(Partition::Questions, &id.to_string()))
    }

    /// All questions, in key order.
    pub fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        self.view(|tx| tx.scan_json::<Question>(Partition::Questions))
            .map(|rows| rows.into_iter().map(|(_, q)| q).collect())
    }

    /// Questions posted to one channel of one team.
    pub fn questions_for_channel(
        &self,
        team_id: &str,
        channel: &str,
    ) -> Result<Vec<Question>, StoreError> {
        Ok(self
            .list_questions()?
            .into_iter()
            .filter(|q| q.team_id == team_id && q.channel == channel)
            .collect())
    }

    /// Delete a question and every round that belongs to it.
    ///
    /// Returns the number of rounds removed.
    #[tracing::instrument(skip(self))]
    pub fn delete_question(&self, id: u64) -> Result<usize, StoreError> {
        let removed = self.update(|tx| {
            let keys: Vec<String> = tx
                .scan_json::<Round>(Partition::Rounds)?
                .into_iter()
                .filter(|(_, round)| round.question_id == id)
                .map(|(key, _)| key)
                .collect();

            for key in &keys {
                tx.delete(Partition::Rounds, key)?;
            }
            tx.delete(Partition::Questions, &id.to_string())?;
            Ok(keys.len())
        })?;

        info!(question = id, rounds = removed, "deleted question");
        Ok(removed)
    }

    /// Stamp `team_id` on questions stored without a team.
    ///
    /// Returns the number of questions updated.
    pub fn assign_team_to_orphans(&self, team_id: &str) -> Result<usize, StoreError> {
        self.update(|tx| {
            let mut updated = 0;
            for (key, mut question) in tx.scan_json::<Question>(Partition::Questions)? {
                if question.team_id.is_empty() {
                    question.team_id = team_id.to_string();
                    tx.put_json(Partition::Questions, &key, &question)?;
                    updated += 1;
                }
            }
            debug!(team = %team_id, updated, "assigned team to questions without one");
            Ok(updated)
        })
    }

    // =========================================================================
    // Rounds
    // =========================================================================

    /// Insert or replace a round. The round must have been posted.
    pub fn save_round(&self, round: &Round) -> Result<(), StoreError> {
        if !round.is_posted() {
            return Err(StoreError::InvalidRecord(format!(
                "round of question {} has no timestamp",
                round.question_id
            )));
        }
        self.update(|tx| tx.put_json(Partition::Rounds, &round.key().storage_key(), round))
    }

    /// Load a round by key.
    pub fn load_round(&self, key: &RoundKey) -> Result<Option<Round>, StoreError> {
        self.view(|tx| tx.get_json(Partition::Rounds, &key.storage_key()))
    }

    /// All rounds, in key order.
    pub fn list_rounds(&self) -> Result<Vec<Round>, StoreError> {
        self.view(|tx| tx.scan_json::<Round>(Partition::Rounds))
            .map(|rows| rows.into_iter().map(|(_, r)| r).collect())
    }

    /// All rounds of one question.
    pub fn rounds_for_question(&self, question_id: u64) -> Result<Vec<Round>, StoreError> {
        Ok(self
            .list_rounds()?
            .into_iter()
            .filter(|r| r.question_id == question_id)
            .collect())
    }

    /// The latest round of a question, if it has one.
    pub fn current_round(&self, question: &Question) -> Result<Option<Round>, StoreError> {
        match question.current_round_key() {
            Some(key) => self.load_round(&key),
            None => Ok(None),
        }
    }
}
