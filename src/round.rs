//! Round engine
//!
//! This module owns the round state machine: the cadence that starts
//! rounds, prompt generation, response collection, scoring, and round-count
//! bookkeeping. Rounds are strictly sequential and move through
//! `Idle -> Prompted -> Collecting -> Idle`.
//!
//! The engine does not own connections. Every operation that talks to
//! clients borrows the [`Watchers`] for fan-out and a tunnel finder, and
//! every operation that arms or cancels a timer borrows a [`Scheduler`].

use std::time::Duration;

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    AlarmMessage, Notice, UpdateMessage,
    config::{Pacing, RoundLimit},
    leaderboard::Leaderboard,
    mode::{self, Mode, Prompt, Submission},
    registry::SessionRegistry,
    scheduler::{Scheduler, TimerId},
    session::Tunnel,
    watcher::{Audience, Id, Watchers},
};

/// The engine's position within a round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// No round in progress
    #[default]
    Idle,
    /// A prompt is out and responses are being accepted
    Prompted,
    /// The response window closed and scoring is running
    Collecting,
}

/// One participant submission
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Who answered, as reported by the client
    pub identity: String,
    /// The submitted gesture or count
    pub value: Submission,
    /// Client-reported time between prompt and answer
    pub elapsed_ms: f64,
    /// Client-reported recognition confidence in `[0, 1]`
    pub confidence: f64,
}

/// Result of one response, as broadcast to participants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundResult {
    /// Who answered
    pub identity: String,
    /// Human-readable outcome
    pub result_text: &'static str,
    /// Points earned by this response
    pub round_score: f64,
}

/// The round state machine
#[derive(Debug)]
pub struct Engine {
    mode: Mode,
    pacing: Pacing,
    default_round_limit: RoundLimit,

    phase: Phase,
    current_prompt: Option<Prompt>,
    /// Response window advertised with the current prompt
    round_window: Duration,
    pending_responses: Vec<Response>,
    round_index: usize,
    round_limit: usize,

    /// The armed cadence alarm; present iff the game is running
    cadence: Option<TimerId>,
    /// The armed response-window alarm of the current round
    collection: Option<TimerId>,
    cadence_serial: u64,
    round_serial: u64,

    rng: fastrand::Rng,
}

impl Engine {
    /// Creates an idle engine
    pub fn new(pacing: Pacing, default_round_limit: RoundLimit, rng: fastrand::Rng) -> Self {
        Self {
            mode: Mode::default(),
            pacing,
            default_round_limit,
            phase: Phase::Idle,
            current_prompt: None,
            round_window: pacing.response_window,
            pending_responses: Vec::new(),
            round_index: 0,
            round_limit: default_round_limit.0,
            cadence: None,
            collection: None,
            cadence_serial: 0,
            round_serial: 0,
            rng,
        }
    }

    /// The active mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The active pacing
    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// The current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The active prompt, absent while idle between games
    pub fn current_prompt(&self) -> Option<Prompt> {
        self.current_prompt
    }

    /// Submissions recorded since the current round began
    pub fn pending_responses(&self) -> &[Response] {
        &self.pending_responses
    }

    /// Number of rounds started in the current game
    pub fn round_index(&self) -> usize {
        self.round_index
    }

    /// Number of rounds the current game will play
    pub fn round_limit(&self) -> usize {
        self.round_limit
    }

    /// Whether a game is running
    pub fn is_running(&self) -> bool {
        self.cadence.is_some()
    }

    fn notify_operators<T: Tunnel, F: Fn(Id) -> Option<T>>(
        watchers: &Watchers,
        message: String,
        tunnel_finder: F,
    ) {
        watchers.announce(Audience::Operators, &Notice::info(message).into(), tunnel_finder);
    }

    fn arm_cadence<S: Scheduler>(&mut self, scheduler: &mut S) {
        self.cadence_serial += 1;
        self.cadence = Some(scheduler.schedule(
            AlarmMessage::RoundTick {
                cadence: self.cadence_serial,
            },
            self.pacing.round_period(),
        ));
    }

    /// Starts a game of `round_limit` rounds
    ///
    /// The first round begins one full period from now. Has no effect while
    /// a game is already running.
    ///
    /// # Returns
    ///
    /// `true` if a game was started
    pub fn start<S: Scheduler, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        round_limit: RoundLimit,
        watchers: &Watchers,
        scheduler: &mut S,
        tunnel_finder: F,
    ) -> bool {
        if self.is_running() {
            debug!("start ignored, game already running");
            return false;
        }

        self.round_limit = round_limit.0;
        self.round_index = 0;
        self.arm_cadence(scheduler);

        info!(mode = %self.mode, rounds = self.round_limit, "game started");
        Self::notify_operators(
            watchers,
            format!(
                "Game '{}' started for {} rounds.",
                self.mode, self.round_limit
            ),
            tunnel_finder,
        );

        true
    }

    /// Handles a cadence alarm
    ///
    /// Begins the next round if anyone is registered, or stops the game once
    /// the round limit has been played. A tick that lands while a round is
    /// still open only re-arms, so auto-stop never cuts a round short.
    pub fn tick<S: Scheduler, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        cadence: u64,
        registry: &SessionRegistry,
        watchers: &Watchers,
        scheduler: &mut S,
        tunnel_finder: F,
    ) {
        if self.cadence.is_none() || cadence != self.cadence_serial {
            debug!(cadence, "stale cadence alarm ignored");
            return;
        }
        self.cadence = None;

        if registry.is_empty() || self.phase != Phase::Idle {
            self.arm_cadence(scheduler);
            return;
        }

        if self.round_index >= self.round_limit {
            info!(rounds = self.round_index, "round limit reached");
            self.stop(watchers, scheduler, tunnel_finder);
            return;
        }

        self.arm_cadence(scheduler);
        self.begin_round(watchers, scheduler, tunnel_finder);
    }

    /// Starts a round: draws a prompt, announces it, and arms the window
    ///
    /// # Returns
    ///
    /// `false` if the previous round's window is still open
    pub fn begin_round<S: Scheduler, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watchers: &Watchers,
        scheduler: &mut S,
        tunnel_finder: F,
    ) -> bool {
        if self.phase != Phase::Idle {
            debug!(phase = ?self.phase, "round not started, previous round still open");
            return false;
        }

        self.round_index += 1;
        self.round_serial += 1;
        let prompt = self.mode.draw_prompt(&mut self.rng);
        self.current_prompt = Some(prompt);
        self.round_window = self.pacing.response_window;
        self.phase = Phase::Prompted;
        self.pending_responses.clear();

        info!(
            round = self.round_index,
            of = self.round_limit,
            %prompt,
            "round started"
        );

        watchers.announce(
            Audience::Participants,
            &UpdateMessage::Prompt {
                prompt,
                response_window: self.round_window,
                round_index: self.round_index,
                round_limit: self.round_limit,
            },
            &tunnel_finder,
        );
        watchers.announce(
            Audience::Operators,
            &UpdateMessage::RoundStarted {
                prompt,
                countdown_duration: self.round_window,
                round_index: self.round_index,
                round_limit: self.round_limit,
            },
            &tunnel_finder,
        );

        self.collection = Some(scheduler.schedule(
            AlarmMessage::CloseWindow {
                round: self.round_serial,
            },
            self.round_window,
        ));

        true
    }

    /// Appends a submission to the current round
    ///
    /// The phase is not checked and submissions are not deduplicated: a
    /// late response lands in a list that the next round clears, and a
    /// participant answering twice is scored twice.
    pub fn record_response(&mut self, response: Response, leaderboard: &mut Leaderboard) {
        debug!(
            identity = %response.identity,
            phase = ?self.phase,
            "response recorded"
        );
        leaderboard.ensure(&response.identity);
        self.pending_responses.push(response);
    }

    /// Handles a response-window alarm
    pub fn close_window<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        round: u64,
        leaderboard: &mut Leaderboard,
        registry: &SessionRegistry,
        watchers: &Watchers,
        tunnel_finder: F,
    ) {
        if self.phase != Phase::Prompted || round != self.round_serial {
            debug!(round, "stale window alarm ignored");
            return;
        }
        self.collection = None;

        self.collect(leaderboard, registry, watchers, tunnel_finder);
    }

    /// Scores every pending response and broadcasts the results
    pub fn collect<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        leaderboard: &mut Leaderboard,
        registry: &SessionRegistry,
        watchers: &Watchers,
        tunnel_finder: F,
    ) {
        self.phase = Phase::Collecting;

        let Some(prompt) = self.current_prompt else {
            self.phase = Phase::Idle;
            return;
        };

        let results = self
            .pending_responses
            .iter()
            .map(|response| {
                let outcome = prompt.judge(&response.value);
                leaderboard.apply(&response.identity, outcome);
                RoundResult {
                    identity: response.identity.clone(),
                    result_text: outcome.result_text(),
                    round_score: mode::round_score(
                        response.confidence,
                        response.elapsed_ms,
                        self.round_window,
                    ),
                }
            })
            .collect_vec();

        info!(
            round = self.round_index,
            responses = results.len(),
            "round collected"
        );

        watchers.announce(
            Audience::Participants,
            &UpdateMessage::Results { results },
            &tunnel_finder,
        );
        watchers.announce(
            Audience::Both,
            &UpdateMessage::ScoreTable {
                scores: leaderboard.table(registry.list()),
            },
            &tunnel_finder,
        );

        self.phase = Phase::Idle;
    }

    /// Cancels both timers and returns every round field to its idle value
    ///
    /// The score ledger is untouched.
    pub fn halt<S: Scheduler>(&mut self, scheduler: &mut S) {
        if let Some(timer) = self.cadence.take() {
            scheduler.cancel(timer);
        }
        if let Some(timer) = self.collection.take() {
            scheduler.cancel(timer);
        }
        self.round_serial += 1;
        self.phase = Phase::Idle;
        self.current_prompt = None;
        self.pending_responses.clear();
        self.round_index = 0;
        self.round_limit = self.default_round_limit.0;
    }

    /// Stops the game, keeping scores
    pub fn stop<S: Scheduler, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watchers: &Watchers,
        scheduler: &mut S,
        tunnel_finder: F,
    ) {
        self.halt(scheduler);

        info!(mode = %self.mode, "game stopped");
        Self::notify_operators(
            watchers,
            format!("Game '{}' has been stopped.", self.mode),
            tunnel_finder,
        );
    }

    /// Switches the mode used by subsequent rounds
    ///
    /// A round already in flight keeps the prompt it was started with.
    pub fn set_mode<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        mode: Mode,
        watchers: &Watchers,
        tunnel_finder: F,
    ) {
        self.mode = mode;

        info!(%mode, "mode changed");
        Self::notify_operators(
            watchers,
            format!("Game mode set to '{mode}'."),
            &tunnel_finder,
        );
        watchers.announce(
            Audience::Both,
            &UpdateMessage::ModeChanged { mode },
            &tunnel_finder,
        );
    }

    /// Replaces the pacing
    ///
    /// A running cadence is torn down and re-armed with the new period,
    /// counted from now. The window of a round already in flight still
    /// closes on its first schedule.
    pub fn update_config<S: Scheduler, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        pacing: Pacing,
        watchers: &Watchers,
        scheduler: &mut S,
        tunnel_finder: F,
    ) {
        self.pacing = pacing;

        if let Some(timer) = self.cadence.take() {
            scheduler.cancel(timer);
            self.arm_cadence(scheduler);
        }

        let prompt_interval = pacing.prompt_interval.as_millis() as u64;
        let response_window = pacing.response_window.as_millis() as u64;
        info!(prompt_interval, response_window, "configuration updated");
        Self::notify_operators(
            watchers,
            format!(
                "Game configuration updated: Prompt Interval={prompt_interval}ms, Response Timeout={response_window}ms."
            ),
            &tunnel_finder,
        );
        watchers.announce(
            Audience::Participants,
            &UpdateMessage::ConfigUpdated {
                prompt_interval: pacing.prompt_interval,
                response_window: pacing.response_window,
            },
            &tunnel_finder,
        );
    }
}
