//! Game mode implementations
//!
//! A mode selects the prompt domain and the correctness rule for a round.
//! Both modes share the same round-score formula, which rewards confidence
//! first and response speed second.

pub mod counting;
pub mod gesture;

use std::{fmt::Display, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::scoring;

use self::gesture::Gesture;

/// The recognized game types
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Rock, paper, scissors against a randomly drawn system gesture
    #[default]
    #[serde(rename = "rps")]
    Gesture,
    /// Show the prompted number of fingers
    #[serde(rename = "counting")]
    Counting,
}

/// The requested mode is not one of the recognized set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized mode `{0}`")]
pub struct UnknownMode(pub String);

impl Mode {
    /// Wire name of the mode
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gesture => "rps",
            Self::Counting => "counting",
        }
    }

    /// Draws a prompt uniformly from this mode's prompt domain
    pub fn draw_prompt(self, rng: &mut fastrand::Rng) -> Prompt {
        match self {
            Self::Gesture => Prompt::Gesture(Gesture::random(rng)),
            Self::Counting => Prompt::Count(counting::random(rng)),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rps" => Ok(Self::Gesture),
            "counting" => Ok(Self::Counting),
            other => Err(UnknownMode(other.to_owned())),
        }
    }
}

/// The active challenge of a round
///
/// Serializes as the bare gesture name or the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display, derive_more::From)]
#[serde(untagged)]
pub enum Prompt {
    /// A gesture to play against
    #[display("{_0}")]
    Gesture(Gesture),
    /// A number of fingers to show
    #[display("{_0}")]
    Count(u8),
}

impl Prompt {
    /// Classifies a submission against this prompt
    pub fn judge(self, submission: &Submission) -> Outcome {
        match self {
            Self::Gesture(system) => gesture::judge_submission(submission, system),
            Self::Count(expected) => counting::judge_submission(submission, expected),
        }
    }
}

/// A value submitted by a participant
///
/// Clients send gestures as strings and counts as integers, but a count
/// sent as a fractional number or as numeric text is accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Submission {
    /// An integer submission
    Number(i64),
    /// A non-integral JSON number, such as `3.0`
    Float(f64),
    /// A textual submission
    Text(String),
}

impl Submission {
    /// Interprets the submission as an integer, if possible
    ///
    /// Fractional values are truncated toward zero.
    pub fn as_count(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Float(f) => truncate(*f),
            Self::Text(s) => {
                let s = s.trim();
                s.parse()
                    .ok()
                    .or_else(|| s.parse().ok().and_then(truncate))
            }
        }
    }

    /// Interprets the submission as a gesture, if possible
    pub fn as_gesture(&self) -> Option<Gesture> {
        match self {
            Self::Number(_) | Self::Float(_) => None,
            Self::Text(s) => s.parse().ok(),
        }
    }
}

fn truncate(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

/// The classification of one response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Gesture mode: the participant's gesture beats the prompt
    Win,
    /// Gesture mode: the prompt beats the participant's gesture
    Loss,
    /// Gesture mode: both gestures are equal
    Tie,
    /// Counting mode: the submitted count equals the prompt
    Correct,
    /// Counting mode: any other submission
    Incorrect,
}

impl Outcome {
    /// Text shown to participants in the results list
    pub fn result_text(self) -> &'static str {
        match self {
            Self::Win => "You Win!",
            Self::Loss => "You Lose!",
            Self::Tie => "Tie",
            Self::Correct => "Correct",
            Self::Incorrect => "Incorrect",
        }
    }
}

/// Computes the points earned by one response
///
/// `round_score = (confidence * 0.7 + time_score * 0.3) * 100`, where the
/// time score falls linearly from 1 at zero elapsed time to 0 at the
/// deadline and stays 0 afterwards.
pub fn round_score(confidence: f64, elapsed_ms: f64, response_window: Duration) -> f64 {
    let window_ms = response_window.as_secs_f64() * 1000.;
    let time_score = if window_ms > 0. {
        ((window_ms - elapsed_ms) / window_ms).max(0.)
    } else {
        0.
    };

    (confidence * scoring::CONFIDENCE_WEIGHT + time_score * scoring::TIME_WEIGHT) * scoring::SCALE
}
