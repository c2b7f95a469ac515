//! # Quickdraw Game Library
//!
//! This library provides the core of a timed, multi-round reaction game
//! (rock-paper-scissors or counting) played over a persistent push channel.
//! It owns the round lifecycle, response collection, scoring, and the
//! fan-out of state to participants and operators. A tokio runtime and an
//! axum WebSocket endpoint drive it in production.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod config;
pub mod constants;
pub mod game;
pub mod leaderboard;
pub mod mode;
pub mod registry;
pub mod round;
pub mod runtime;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod watcher;

use leaderboard::ScoreLine;
use mode::{Mode, Prompt};
use round::RoundResult;

/// Events pushed to connected clients
///
/// Every event travels as `{"event": <name>, "data": <payload>}`.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum UpdateMessage {
    /// The active mode, sent to a participant right after it joins
    ModeAnnounced {
        /// The active mode
        mode: Mode,
    },
    /// The operator switched modes
    ModeChanged {
        /// The new mode
        mode: Mode,
    },
    /// A new round started; participants should respond
    Prompt {
        /// The challenge to respond to
        prompt: Prompt,
        /// Time available to respond
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        response_window: Duration,
        /// One-based index of this round
        round_index: usize,
        /// Total rounds in this game
        round_limit: usize,
    },
    /// Outcome of every response recorded in the round that just closed
    Results {
        /// One entry per recorded response
        results: Vec<RoundResult>,
    },
    /// Cumulative scores of the registered participants
    ScoreTable {
        /// One line per registered participant, in join order
        scores: Vec<ScoreLine>,
    },
    /// Registered participants, as seen by participants
    PlayerList {
        /// Participants in join order
        clients: Vec<ClientEntry>,
    },
    /// Registered participants, as seen by operators
    ClientList {
        /// Participants in join order
        clients: Vec<ClientEntry>,
    },
    /// The session was wiped
    GameReset {},
    /// The operator changed the round pacing
    ConfigUpdated {
        /// New prompt interval
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        prompt_interval: Duration,
        /// New response window
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        response_window: Duration,
    },
    /// Human-readable status line for operators
    OperatorNotice(Notice),
    /// A new round started, as seen by operators
    RoundStarted {
        /// The challenge participants must respond to
        prompt: Prompt,
        /// Length of the response countdown
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        countdown_duration: Duration,
        /// One-based index of this round
        round_index: usize,
        /// Total rounds in this game
        round_limit: usize,
    },
    /// A command from this connection was refused
    Error {
        /// Why the command was refused
        message: String,
    },
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }

    /// Wire name of the event
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ModeAnnounced { .. } => "mode_announced",
            Self::ModeChanged { .. } => "mode_changed",
            Self::Prompt { .. } => "prompt",
            Self::Results { .. } => "results",
            Self::ScoreTable { .. } => "score_table",
            Self::PlayerList { .. } => "player_list",
            Self::ClientList { .. } => "client_list",
            Self::GameReset {} => "game_reset",
            Self::ConfigUpdated { .. } => "config_updated",
            Self::OperatorNotice(_) => "operator_notice",
            Self::RoundStarted { .. } => "round_started",
            Self::Error { .. } => "error",
        }
    }
}

/// A registered participant as listed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientEntry {
    /// The participant's identity
    pub identity: String,
}

/// Importance of an operator notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Routine lifecycle information
    Info,
}

/// A status line pushed to operators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    /// The text to display
    pub message: String,
    /// When the notice was produced
    pub timestamp: DateTime<Utc>,
    /// How important the notice is
    pub severity: Severity,
}

impl Notice {
    /// Creates an informational notice stamped with the current time
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            severity: Severity::Info,
        }
    }
}

impl From<Notice> for UpdateMessage {
    fn from(notice: Notice) -> Self {
        Self::OperatorNotice(notice)
    }
}

/// Alarm messages for timed events of the round engine
///
/// Each alarm carries the serial of the timer that produced it so that an
/// alarm racing with its own cancellation is recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmMessage {
    /// The round cadence fired
    RoundTick {
        /// Serial of the cadence that was armed
        cadence: u64,
    },
    /// The response window of a round closed
    CloseWindow {
        /// Serial of the round whose window closed
        round: u64,
    },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::mode::gesture::Gesture;

    #[test]
    fn test_prompt_event_wire_shape() {
        let message = UpdateMessage::Prompt {
            prompt: Prompt::Gesture(Gesture::Rock),
            response_window: Duration::from_millis(7000),
            round_index: 1,
            round_limit: 5,
        };
        let json: serde_json::Value = serde_json::from_str(&message.to_message()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "event": "prompt",
                "data": {
                    "prompt": "Rock",
                    "response_window": 7000,
                    "round_index": 1,
                    "round_limit": 5
                }
            })
        );
    }

    #[test]
    fn test_game_reset_has_empty_payload() {
        let json: serde_json::Value =
            serde_json::from_str(&UpdateMessage::GameReset {}.to_message()).unwrap();

        assert_eq!(json, serde_json::json!({"event": "game_reset", "data": {}}));
    }

    #[test]
    fn test_notice_wire_shape() {
        let message: UpdateMessage = Notice::info("hello").into();
        let json: serde_json::Value = serde_json::from_str(&message.to_message()).unwrap();

        assert_eq!(json["event"], "operator_notice");
        assert_eq!(json["data"]["message"], "hello");
        assert_eq!(json["data"]["severity"], "info");
        assert!(json["data"]["timestamp"].is_string());
    }

    #[test]
    fn test_event_name_matches_serialized_tag() {
        let messages = [
            UpdateMessage::ModeAnnounced { mode: Mode::Gesture },
            UpdateMessage::ModeChanged {
                mode: Mode::Counting,
            },
            UpdateMessage::Results { results: vec![] },
            UpdateMessage::ScoreTable { scores: vec![] },
            UpdateMessage::PlayerList { clients: vec![] },
            UpdateMessage::ClientList { clients: vec![] },
            UpdateMessage::GameReset {},
            UpdateMessage::ConfigUpdated {
                prompt_interval: Duration::ZERO,
                response_window: Duration::from_millis(100),
            },
            UpdateMessage::RoundStarted {
                prompt: Prompt::Count(3),
                countdown_duration: Duration::from_millis(100),
                round_index: 1,
                round_limit: 1,
            },
            UpdateMessage::Error {
                message: "Unauthorized action.".to_string(),
            },
        ];

        for message in messages {
            let json: serde_json::Value = serde_json::from_str(&message.to_message()).unwrap();
            assert_eq!(json["event"], message.event_name());
        }
    }
}
