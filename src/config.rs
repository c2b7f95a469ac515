//! Pacing configuration for a game session
//!
//! Operators replace the pacing at runtime through `update_config`; the
//! binary seeds the initial values from the command line. Both paths go
//! through the same `garde` validation.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::constants::{game, pacing};

type ValidationResult = garde::Result;

/// Validates that a duration in milliseconds falls within specified bounds
fn validate_millis<const MIN_MILLIS: u64, const MAX_MILLIS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    let millis = u64::try_from(val.as_millis()).unwrap_or(u64::MAX);
    if (MIN_MILLIS..=MAX_MILLIS).contains(&millis) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_MILLIS},{MAX_MILLIS}] ms",
        )))
    }
}

fn validate_prompt_interval(val: &Duration) -> ValidationResult {
    validate_millis::<{ pacing::MIN_PROMPT_INTERVAL }, { pacing::MAX_PROMPT_INTERVAL }>(
        "prompt_interval",
        val,
    )
}

fn validate_response_window(val: &Duration) -> ValidationResult {
    validate_millis::<{ pacing::MIN_RESPONSE_WINDOW }, { pacing::MAX_RESPONSE_WINDOW }>(
        "response_window",
        val,
    )
}

/// Round pacing as configured by the operator
///
/// Durations travel over the wire as integer milliseconds.
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Pacing {
    /// Delay component that precedes each prompt
    #[garde(custom(|v, _| validate_prompt_interval(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub prompt_interval: Duration,
    /// Time participants have to answer a prompt
    #[garde(custom(|v, _| validate_response_window(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub response_window: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            prompt_interval: Duration::from_millis(pacing::DEFAULT_PROMPT_INTERVAL),
            response_window: Duration::from_millis(pacing::DEFAULT_RESPONSE_WINDOW),
        }
    }
}

impl Pacing {
    /// Period of the round cadence: interval, window and the fixed grace
    pub fn round_period(&self) -> Duration {
        self.prompt_interval + self.response_window + Duration::from_millis(pacing::GRACE)
    }
}

/// Number of rounds an operator asks for when starting a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[garde(transparent)]
#[serde(transparent)]
pub struct RoundLimit(#[garde(range(min = game::MIN_ROUND_LIMIT, max = game::MAX_ROUND_LIMIT))] pub usize);

impl Default for RoundLimit {
    fn default() -> Self {
        Self(game::DEFAULT_ROUND_LIMIT)
    }
}

/// Everything needed to construct a game session
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Validate)]
pub struct GameConfig {
    /// Initial pacing
    #[garde(dive)]
    pub pacing: Pacing,
    /// Round limit restored by `stop` and `reset`
    #[garde(dive)]
    pub default_round_limit: RoundLimit,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_pacing_is_valid() {
        assert!(Pacing::default().validate().is_ok());
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_round_period_adds_grace() {
        let pacing = Pacing {
            prompt_interval: Duration::from_millis(3000),
            response_window: Duration::from_millis(7000),
        };
        assert_eq!(pacing.round_period(), Duration::from_millis(12_000));
    }

    #[test]
    fn test_zero_prompt_interval_is_valid() {
        let pacing = Pacing {
            prompt_interval: Duration::ZERO,
            response_window: Duration::from_millis(100),
        };
        assert!(pacing.validate().is_ok());
    }

    #[test]
    fn test_zero_response_window_is_invalid() {
        let pacing = Pacing {
            prompt_interval: Duration::from_millis(100),
            response_window: Duration::ZERO,
        };
        assert!(pacing.validate().is_err());
    }

    #[test]
    fn test_prompt_interval_too_long() {
        let pacing = Pacing {
            prompt_interval: Duration::from_millis(pacing::MAX_PROMPT_INTERVAL + 1),
            response_window: Duration::from_millis(100),
        };
        assert!(pacing.validate().is_err());
    }

    #[test]
    fn test_round_limit_bounds() {
        assert!(RoundLimit(0).validate().is_err());
        assert!(RoundLimit(1).validate().is_ok());
        assert!(RoundLimit(game::MAX_ROUND_LIMIT).validate().is_ok());
        assert!(RoundLimit(game::MAX_ROUND_LIMIT + 1).validate().is_err());
    }

    #[test]
    fn test_pacing_deserializes_from_millis() {
        let pacing: Pacing =
            serde_json::from_str(r#"{"prompt_interval":0,"response_window":100}"#).unwrap();
        assert_eq!(pacing.prompt_interval, Duration::ZERO);
        assert_eq!(pacing.response_window, Duration::from_millis(100));
    }
}
