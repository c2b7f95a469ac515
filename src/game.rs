//! Game context and command dispatch
//!
//! This module ties the session registry, the score ledger, the round
//! engine and the connection rooms into one [`Game`] and routes inbound
//! commands to them after checking the caller's role.

use std::time::Duration;

use garde::Validate;
use itertools::Itertools;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    AlarmMessage, ClientEntry, Notice, UpdateMessage,
    config::{GameConfig, Pacing, RoundLimit},
    leaderboard::Leaderboard,
    mode::{Mode, Submission, UnknownMode},
    registry::{self, SessionRegistry},
    round::{Engine, Response},
    scheduler::Scheduler,
    session::Tunnel,
    watcher::{Audience, Id, Role, Watchers},
};

/// Reasons a command was not carried out
#[derive(Error, Debug)]
pub enum Error {
    /// An operator command from a connection without the operator role
    #[error("Unauthorized action.")]
    Unauthorized,
    /// A required payload field was absent
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A pacing or round limit outside the accepted bounds
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] garde::Report),
    /// `set_mode` named a mode that does not exist
    #[error(transparent)]
    UnknownMode(#[from] UnknownMode),
    /// The participant could not be registered
    #[error(transparent)]
    Registry(#[from] registry::Error),
    /// The connection already claimed a conflicting role
    #[error("connection already holds the {0:?} role")]
    RoleTaken(Role),
    /// The event name is not one this server understands
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    /// The frame is not valid JSON or a payload has the wrong shape
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Payload of `join`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct JoinRequest {
    /// The identity to register under
    pub identity: Option<String>,
}

/// Payload of `submit_response`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResponseSubmission {
    /// Who is answering
    pub identity: Option<String>,
    /// The gesture name or count
    pub value: Option<Submission>,
    /// Milliseconds between prompt and answer
    pub elapsed_ms: Option<f64>,
    /// Recognition confidence in `[0, 1]`
    pub confidence: Option<f64>,
}

/// Payload of `set_mode`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModeRequest {
    /// Wire name of the requested mode
    pub mode: Option<String>,
}

/// Payload of `start_game`
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    /// Number of rounds to play
    pub round_limit: Option<usize>,
}

/// Payload of `update_config`, durations in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigRequest {
    /// New prompt interval
    pub prompt_interval: Option<u64>,
    /// New response window
    pub response_window: Option<u64>,
}

/// Commands received from connections
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    /// Register as a participant
    Join(JoinRequest),
    /// Answer the current prompt
    SubmitResponse(ResponseSubmission),
    /// Claim the operator role
    OperatorJoin,
    /// Switch the mode of subsequent rounds
    SetMode(ModeRequest),
    /// Start a game
    StartGame(StartRequest),
    /// Stop the running game, keeping scores
    StopGame,
    /// Wipe the session
    ResetGame,
    /// Replace the round pacing
    UpdateConfig(ConfigRequest),
    /// Ask for the current client list and score table
    RequestSnapshot,
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl IncomingMessage {
    /// Parses a `{"event": ..., "data": ...}` text frame
    ///
    /// A missing or null `data` is read as an empty payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::Malformed` if the frame or payload does not
    /// deserialize, and `Error::UnknownEvent` for unrecognized event names.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let Envelope { event, data } = serde_json::from_str(text)?;
        let data = if data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            data
        };

        Ok(match event.as_str() {
            "join" => Self::Join(serde_json::from_value(data)?),
            "submit_response" => Self::SubmitResponse(serde_json::from_value(data)?),
            "operator_join" => Self::OperatorJoin,
            "set_mode" => Self::SetMode(serde_json::from_value(data)?),
            "start_game" => Self::StartGame(serde_json::from_value(data)?),
            "stop_game" => Self::StopGame,
            "reset_game" => Self::ResetGame,
            "update_config" => Self::UpdateConfig(serde_json::from_value(data)?),
            "request_snapshot" => Self::RequestSnapshot,
            other => return Err(Error::UnknownEvent(other.to_owned())),
        })
    }

    fn is_operator_command(&self) -> bool {
        matches!(
            self,
            Self::SetMode(_)
                | Self::StartGame(_)
                | Self::StopGame
                | Self::ResetGame
                | Self::UpdateConfig(_)
                | Self::RequestSnapshot
        )
    }
}

/// One game session
///
/// Owns every piece of mutable state. All methods are non-blocking and are
/// expected to be called from a single task.
#[derive(Debug)]
pub struct Game {
    watchers: Watchers,
    registry: SessionRegistry,
    leaderboard: Leaderboard,
    engine: Engine,
}

impl Game {
    /// Creates an empty session
    pub fn new(config: GameConfig, rng: fastrand::Rng) -> Self {
        Self {
            watchers: Watchers::default(),
            registry: SessionRegistry::default(),
            leaderboard: Leaderboard::default(),
            engine: Engine::new(config.pacing, config.default_round_limit, rng),
        }
    }

    /// The connection rooms
    pub fn watchers(&self) -> &Watchers {
        &self.watchers
    }

    /// The session registry
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The score ledger
    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    /// The round engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn client_entries(&self) -> Vec<ClientEntry> {
        self.registry
            .list()
            .map(|identity| ClientEntry {
                identity: identity.to_owned(),
            })
            .collect_vec()
    }

    fn announce_player_list<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) {
        let clients = self.client_entries();
        self.watchers.announce(
            Audience::Operators,
            &UpdateMessage::ClientList {
                clients: clients.clone(),
            },
            &tunnel_finder,
        );
        self.watchers.announce(
            Audience::Participants,
            &UpdateMessage::PlayerList { clients },
            &tunnel_finder,
        );
    }

    fn notify_operators<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: String,
        tunnel_finder: F,
    ) {
        self.watchers
            .announce(Audience::Operators, &Notice::info(message).into(), tunnel_finder);
    }

    /// Adds a freshly opened connection with no role
    pub fn connect(&mut self, watcher_id: Id) {
        debug!(%watcher_id, "connection opened");
        self.watchers.add_watcher(watcher_id);
    }

    /// Handles a command from a connection
    ///
    /// Unauthorized commands are answered with an `error` event to the
    /// caller. Every other failure is logged and dropped.
    pub fn receive_message<S: Scheduler, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        message: IncomingMessage,
        scheduler: &mut S,
        tunnel_finder: F,
    ) {
        let Some(role) = self.watchers.role(watcher_id) else {
            debug!(%watcher_id, "message from unknown connection");
            return;
        };

        match self.dispatch(watcher_id, role, message, scheduler, &tunnel_finder) {
            Ok(()) => {}
            Err(Error::Unauthorized) => {
                warn!(%watcher_id, ?role, "unauthorized operator command");
                self.watchers.send_message(
                    &UpdateMessage::Error {
                        message: Error::Unauthorized.to_string(),
                    },
                    watcher_id,
                    tunnel_finder,
                );
            }
            Err(error) => {
                warn!(%watcher_id, %error, "command dropped");
            }
        }
    }

    fn dispatch<S: Scheduler, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        role: Role,
        message: IncomingMessage,
        scheduler: &mut S,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        if message.is_operator_command() && role != Role::Operator {
            return Err(Error::Unauthorized);
        }

        match (message, role) {
            (IncomingMessage::Join(_), Role::Operator) => Err(Error::RoleTaken(Role::Operator)),
            (IncomingMessage::Join(request), _) => self.join(watcher_id, request, tunnel_finder),
            (IncomingMessage::SubmitResponse(submission), _) => {
                self.submit_response(submission, tunnel_finder)
            }
            (IncomingMessage::OperatorJoin, Role::Participant) => {
                Err(Error::RoleTaken(Role::Participant))
            }
            (IncomingMessage::OperatorJoin, Role::Operator) => {
                self.snapshot(watcher_id, tunnel_finder);
                Ok(())
            }
            (IncomingMessage::OperatorJoin, Role::Unassigned) => {
                self.operator_join(watcher_id, tunnel_finder);
                Ok(())
            }
            (IncomingMessage::SetMode(ModeRequest { mode }), _) => {
                let mode: Mode = mode.ok_or(Error::MissingField("mode"))?.parse()?;
                self.engine.set_mode(mode, &self.watchers, tunnel_finder);
                Ok(())
            }
            (IncomingMessage::StartGame(StartRequest { round_limit }), _) => {
                let round_limit = round_limit.map_or_else(RoundLimit::default, RoundLimit);
                round_limit.validate()?;
                self.engine
                    .start(round_limit, &self.watchers, scheduler, tunnel_finder);
                Ok(())
            }
            (IncomingMessage::StopGame, _) => {
                self.engine.stop(&self.watchers, scheduler, tunnel_finder);
                Ok(())
            }
            (IncomingMessage::ResetGame, _) => {
                self.reset(scheduler, tunnel_finder);
                Ok(())
            }
            (
                IncomingMessage::UpdateConfig(ConfigRequest {
                    prompt_interval,
                    response_window,
                }),
                _,
            ) => {
                let pacing = Pacing {
                    prompt_interval: Duration::from_millis(
                        prompt_interval.ok_or(Error::MissingField("prompt_interval"))?,
                    ),
                    response_window: Duration::from_millis(
                        response_window.ok_or(Error::MissingField("response_window"))?,
                    ),
                };
                pacing.validate()?;
                self.engine
                    .update_config(pacing, &self.watchers, scheduler, tunnel_finder);
                Ok(())
            }
            (IncomingMessage::RequestSnapshot, _) => {
                self.snapshot(watcher_id, tunnel_finder);
                Ok(())
            }
        }
    }

    fn join<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        JoinRequest { identity }: JoinRequest,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        let identity = identity
            .filter(|identity| !identity.is_empty())
            .ok_or(Error::MissingField("identity"))?;

        self.registry.register(watcher_id, identity.clone())?;
        self.watchers
            .update_watcher_role(watcher_id, Role::Participant);
        self.leaderboard.ensure(&identity);

        info!(%watcher_id, %identity, "participant joined");

        self.watchers.send_message(
            &UpdateMessage::ModeAnnounced {
                mode: self.engine.mode(),
            },
            watcher_id,
            &tunnel_finder,
        );
        self.announce_player_list(&tunnel_finder);
        self.notify_operators(
            format!("Player '{identity}' joined the game."),
            &tunnel_finder,
        );

        Ok(())
    }

    fn submit_response<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        ResponseSubmission {
            identity,
            value,
            elapsed_ms,
            confidence,
        }: ResponseSubmission,
        tunnel_finder: F,
    ) -> Result<(), Error> {
        let response = Response {
            identity: identity.ok_or(Error::MissingField("identity"))?,
            value: value.ok_or(Error::MissingField("value"))?,
            elapsed_ms: elapsed_ms.ok_or(Error::MissingField("elapsed_ms"))?,
            confidence: confidence.ok_or(Error::MissingField("confidence"))?,
        };
        let identity = response.identity.clone();

        self.engine.record_response(response, &mut self.leaderboard);

        self.notify_operators(
            format!("Received response from '{identity}'."),
            tunnel_finder,
        );

        Ok(())
    }

    fn operator_join<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        self.watchers.update_watcher_role(watcher_id, Role::Operator);

        info!(%watcher_id, "operator joined");

        self.watchers.send_message(
            &Notice::info("Welcome Admin!").into(),
            watcher_id,
            &tunnel_finder,
        );
        self.snapshot(watcher_id, tunnel_finder);
    }

    /// Sends the client list and score table to one connection
    pub fn snapshot<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, watcher_id: Id, tunnel_finder: F) {
        self.watchers.send_message(
            &UpdateMessage::ClientList {
                clients: self.client_entries(),
            },
            watcher_id,
            &tunnel_finder,
        );
        self.watchers.send_message(
            &UpdateMessage::ScoreTable {
                scores: self.leaderboard.table(self.registry.list()),
            },
            watcher_id,
            &tunnel_finder,
        );
    }

    /// Wipes the session
    ///
    /// Stops the game, disconnects every participant, and clears the
    /// registry and the ledger. Operators stay connected. Calling this twice
    /// leaves the same empty state.
    pub fn reset<S: Scheduler, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        scheduler: &mut S,
        tunnel_finder: F,
    ) {
        self.engine.halt(scheduler);

        self.watchers
            .announce(Audience::Both, &UpdateMessage::GameReset {}, &tunnel_finder);

        for watcher_id in self.registry.clear() {
            self.watchers
                .update_watcher_role(watcher_id, Role::Unassigned);
            self.watchers
                .remove_watcher_session(watcher_id, &tunnel_finder);
        }
        self.leaderboard.clear();

        info!(mode = %self.engine.mode(), "game reset");

        self.announce_player_list(&tunnel_finder);
        self.notify_operators(
            format!("Game '{}' reset.", self.engine.mode()),
            &tunnel_finder,
        );
        self.watchers.announce(
            Audience::Both,
            &UpdateMessage::ScoreTable { scores: Vec::new() },
            &tunnel_finder,
        );
    }

    /// Handles a fired alarm
    pub fn receive_alarm<S: Scheduler, T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        alarm: AlarmMessage,
        scheduler: &mut S,
        tunnel_finder: F,
    ) {
        match alarm {
            AlarmMessage::RoundTick { cadence } => self.engine.tick(
                cadence,
                &self.registry,
                &self.watchers,
                scheduler,
                tunnel_finder,
            ),
            AlarmMessage::CloseWindow { round } => self.engine.close_window(
                round,
                &mut self.leaderboard,
                &self.registry,
                &self.watchers,
                tunnel_finder,
            ),
        }
    }

    /// Forgets a closed connection
    ///
    /// A participant is unregistered but keeps its score record.
    pub fn disconnect<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        match self.watchers.remove_watcher(watcher_id) {
            Some(Role::Operator) => info!(%watcher_id, "operator left"),
            Some(Role::Participant) => {
                let Some(identity) = self.registry.unregister(watcher_id) else {
                    return;
                };
                info!(%watcher_id, %identity, "participant left");
                self.announce_player_list(&tunnel_finder);
                self.notify_operators(
                    format!("Player '{identity}' disconnected."),
                    &tunnel_finder,
                );
            }
            Some(Role::Unassigned) | None => debug!(%watcher_id, "connection closed"),
        }
    }

    /// Cancels every armed timer
    pub fn shutdown<S: Scheduler>(&mut self, scheduler: &mut S) {
        self.engine.halt(scheduler);
    }
}
