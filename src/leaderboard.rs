//! Score ledger
//!
//! This module keeps the cumulative outcome counters of every identity that
//! took part in the current session. Records outlive a participant's
//! disconnect and are only dropped by a full reset. The round engine is the
//! only writer.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::mode::Outcome;

/// Cumulative counters for one identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// One point per win or correct answer
    pub score: u64,
    /// Number of wins (correct answers count as wins)
    pub wins: u64,
    /// Number of losses (incorrect answers count as losses)
    pub losses: u64,
    /// Number of ties
    pub ties: u64,
}

impl ScoreRecord {
    /// Folds one outcome into the counters
    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win | Outcome::Correct => {
                self.score += 1;
                self.wins += 1;
            }
            Outcome::Loss | Outcome::Incorrect => self.losses += 1,
            Outcome::Tie => self.ties += 1,
        }
    }
}

/// One row of the score table as sent to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreLine {
    /// The participant's identity
    pub identity: String,
    /// The participant's counters
    #[serde(flatten)]
    pub record: ScoreRecord,
}

/// Maps identities to their score records
#[derive(Debug, Default)]
pub struct Leaderboard {
    records: HashMap<String, ScoreRecord>,
}

impl Leaderboard {
    /// Creates a zeroed record for `identity` unless one already exists
    pub fn ensure(&mut self, identity: &str) {
        if !self.records.contains_key(identity) {
            self.records
                .insert(identity.to_owned(), ScoreRecord::default());
        }
    }

    /// Applies an outcome to `identity`, creating its record if needed
    ///
    /// # Returns
    ///
    /// The updated record
    pub fn apply(&mut self, identity: &str, outcome: Outcome) -> ScoreRecord {
        let record = self.records.entry(identity.to_owned()).or_default();
        record.apply(outcome);
        *record
    }

    /// Gets the record of `identity`, if it has one
    pub fn record(&self, identity: &str) -> Option<ScoreRecord> {
        self.records.get(identity).copied()
    }

    /// Builds the score table for the given identities, in the given order
    ///
    /// Identities without a record are listed with zeroed counters.
    pub fn table<'a, I: IntoIterator<Item = &'a str>>(&self, identities: I) -> Vec<ScoreLine> {
        identities
            .into_iter()
            .map(|identity| ScoreLine {
                identity: identity.to_owned(),
                record: self.record(identity).unwrap_or_default(),
            })
            .collect_vec()
    }

    /// Number of identities with a record
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no identity has a record
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_creates_zeroed_record_once() {
        let mut leaderboard = Leaderboard::default();
        leaderboard.ensure("alice");
        leaderboard.apply("alice", Outcome::Win);
        leaderboard.ensure("alice");

        assert_eq!(
            leaderboard.record("alice"),
            Some(ScoreRecord {
                score: 1,
                wins: 1,
                losses: 0,
                ties: 0
            })
        );
    }

    #[test]
    fn test_apply_outcomes() {
        let mut leaderboard = Leaderboard::default();
        leaderboard.apply("bob", Outcome::Win);
        leaderboard.apply("bob", Outcome::Correct);
        leaderboard.apply("bob", Outcome::Loss);
        leaderboard.apply("bob", Outcome::Incorrect);
        let record = leaderboard.apply("bob", Outcome::Tie);

        assert_eq!(
            record,
            ScoreRecord {
                score: 2,
                wins: 2,
                losses: 2,
                ties: 1
            }
        );
    }

    #[test]
    fn test_table_keeps_order_and_zero_fills() {
        let mut leaderboard = Leaderboard::default();
        leaderboard.apply("carol", Outcome::Win);

        let table = leaderboard.table(["dave", "carol"]);

        assert_eq!(table.len(), 2);
        assert_eq!(table[0].identity, "dave");
        assert_eq!(table[0].record, ScoreRecord::default());
        assert_eq!(table[1].identity, "carol");
        assert_eq!(table[1].record.wins, 1);
    }

    #[test]
    fn test_score_line_serialization_is_flat() {
        let line = ScoreLine {
            identity: "erin".to_string(),
            record: ScoreRecord {
                score: 1,
                wins: 1,
                losses: 2,
                ties: 3,
            },
        };
        let json = serde_json::to_value(&line).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"identity": "erin", "score": 1, "wins": 1, "losses": 2, "ties": 3})
        );
    }

    #[test]
    fn test_clear() {
        let mut leaderboard = Leaderboard::default();
        leaderboard.ensure("frank");
        assert_eq!(leaderboard.len(), 1);
        leaderboard.clear();
        assert!(leaderboard.is_empty());
    }
}
