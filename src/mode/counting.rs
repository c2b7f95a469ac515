//! Counting: show the prompted number of fingers
//!
//! There is no tie in this mode; a submission is either correct or not.

use crate::constants::counting::{MAX_PROMPT, MIN_PROMPT};

use super::{Outcome, Submission};

/// Draws a count uniformly from the prompt domain
pub fn random(rng: &mut fastrand::Rng) -> u8 {
    rng.u8(MIN_PROMPT..=MAX_PROMPT)
}

/// Judges a raw submission against the prompted count
pub fn judge_submission(submission: &Submission, expected: u8) -> Outcome {
    if submission.as_count() == Some(i64::from(expected)) {
        Outcome::Correct
    } else {
        Outcome::Incorrect
    }
}
