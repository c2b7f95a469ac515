//! Rock, paper, scissors
//!
//! The system draws a gesture and every participant plays against it.
//! Outcomes are reported from the participant's perspective.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{Outcome, Submission};

/// One of the three hand gestures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gesture {
    /// Beats scissors
    Rock,
    /// Beats rock
    Paper,
    /// Beats paper
    Scissors,
}

impl Gesture {
    /// Every gesture, in prompt-domain order
    pub const ALL: [Gesture; 3] = [Gesture::Rock, Gesture::Paper, Gesture::Scissors];

    /// Draws a gesture uniformly at random
    pub fn random(rng: &mut fastrand::Rng) -> Self {
        Self::ALL[rng.usize(..Self::ALL.len())]
    }

    /// Whether this gesture beats `other`
    pub fn beats(self, other: Gesture) -> bool {
        matches!(
            (self, other),
            (Gesture::Rock, Gesture::Scissors)
                | (Gesture::Scissors, Gesture::Paper)
                | (Gesture::Paper, Gesture::Rock)
        )
    }
}

impl Display for Gesture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Gesture::Rock => "Rock",
            Gesture::Paper => "Paper",
            Gesture::Scissors => "Scissors",
        })
    }
}

impl FromStr for Gesture {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|gesture| gesture.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// Plays `player` against `system`
pub fn judge(player: Gesture, system: Gesture) -> Outcome {
    if player == system {
        Outcome::Tie
    } else if player.beats(system) {
        Outcome::Win
    } else {
        Outcome::Loss
    }
}

/// Judges a raw submission; anything that is not a gesture loses
pub fn judge_submission(submission: &Submission, system: Gesture) -> Outcome {
    submission
        .as_gesture()
        .map_or(Outcome::Loss, |player| judge(player, system))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_outcome_table_is_total_and_balanced() {
        let outcomes = Gesture::ALL
            .into_iter()
            .cartesian_product(Gesture::ALL)
            .map(|(player, system)| judge(player, system))
            .counts();

        assert_eq!(outcomes.values().sum::<usize>(), 9);
        assert_eq!(outcomes.get(&Outcome::Tie), Some(&3));
        assert_eq!(outcomes.get(&Outcome::Win), Some(&3));
        assert_eq!(outcomes.get(&Outcome::Loss), Some(&3));
    }

    #[test]
    fn test_beats_relation() {
        assert_eq!(judge(Gesture::Rock, Gesture::Scissors), Outcome::Win);
        assert_eq!(judge(Gesture::Scissors, Gesture::Paper), Outcome::Win);
        assert_eq!(judge(Gesture::Paper, Gesture::Rock), Outcome::Win);
        assert_eq!(judge(Gesture::Scissors, Gesture::Rock), Outcome::Loss);
        assert_eq!(judge(Gesture::Paper, Gesture::Paper), Outcome::Tie);
    }

    #[test]
    fn test_parse_gesture() {
        assert_eq!("Rock".parse(), Ok(Gesture::Rock));
        assert_eq!("scissors".parse(), Ok(Gesture::Scissors));
        assert_eq!("Lizard".parse::<Gesture>(), Err(()));
    }

    #[test]
    fn test_unknown_submission_loses() {
        assert_eq!(
            judge_submission(&Submission::Text("Spock".to_string()), Gesture::Rock),
            Outcome::Loss
        );
        assert_eq!(
            judge_submission(&Submission::Number(1), Gesture::Rock),
            Outcome::Loss
        );
    }

    #[test]
    fn test_random_covers_domain() {
        let mut rng = fastrand::Rng::with_seed(42);
        let drawn = (0..200).map(|_| Gesture::random(&mut rng)).unique().count();
        assert_eq!(drawn, 3);
    }
}
