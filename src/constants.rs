//! Configuration constants for the Quickdraw game system
//!
//! This module contains the default pacing values and the limits used
//! to validate operator-supplied configuration, so that every component
//! agrees on the same boundaries.

/// Session-wide constants
pub mod game {
    /// Maximum number of participants registered at the same time
    pub const MAX_PLAYER_COUNT: usize = 1000;
    /// Round limit used when `start_game` does not name one
    pub const DEFAULT_ROUND_LIMIT: usize = 5;
    /// Smallest round limit an operator may request
    pub const MIN_ROUND_LIMIT: usize = 1;
    /// Largest round limit an operator may request
    pub const MAX_ROUND_LIMIT: usize = 1000;
}

/// Round pacing constants, all in milliseconds
pub mod pacing {
    /// Default delay component before a prompt
    pub const DEFAULT_PROMPT_INTERVAL: u64 = 3000;
    /// Default time participants have to respond to a prompt
    pub const DEFAULT_RESPONSE_WINDOW: u64 = 7000;
    /// Fixed slack added to every round period after the response window
    pub const GRACE: u64 = 2000;
    /// Minimum prompt interval
    pub const MIN_PROMPT_INTERVAL: u64 = 0;
    /// Maximum prompt interval
    pub const MAX_PROMPT_INTERVAL: u64 = 600_000;
    /// Minimum response window
    pub const MIN_RESPONSE_WINDOW: u64 = 1;
    /// Maximum response window
    pub const MAX_RESPONSE_WINDOW: u64 = 600_000;
}

/// Scoring weights shared by every mode
pub mod scoring {
    /// Weight of the self-reported confidence in a round score
    pub const CONFIDENCE_WEIGHT: f64 = 0.7;
    /// Weight of the response speed in a round score
    pub const TIME_WEIGHT: f64 = 0.3;
    /// Multiplier turning the weighted sum into points
    pub const SCALE: f64 = 100.;
}

/// Counting mode constants
pub mod counting {
    /// Smallest count that can be prompted
    pub const MIN_PROMPT: u8 = 1;
    /// Largest count that can be prompted
    pub const MAX_PROMPT: u8 = 5;
}
