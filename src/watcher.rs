//! Connection roles and broadcast fan-out
//!
//! This module tracks the role of every open connection and the two
//! logical rooms derived from it: one holding every registered participant
//! and one holding every connection that asserted the operator role. It
//! also addresses events to those rooms.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use tracing::debug;
use uuid::Uuid;

use super::{UpdateMessage, session::Tunnel};

/// A unique identifier for a connection
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The role a connection has claimed
///
/// A connection starts unassigned and claims exactly one role, either by
/// joining as a participant or by asserting the operator role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum Role {
    /// Connected but not yet joined
    Unassigned,
    /// Privileged connection controlling the game
    Operator,
    /// Registered player
    Participant,
}

/// The rooms an event can be addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every registered participant
    Participants,
    /// Every operator
    Operators,
    /// Participants and operators
    Both,
}

impl Audience {
    /// Whether a connection with `role` is part of this audience
    pub fn includes(self, role: Role) -> bool {
        matches!(
            (self, role),
            (Audience::Participants | Audience::Both, Role::Participant)
                | (Audience::Operators | Audience::Both, Role::Operator)
        )
    }
}

/// Manages every open connection and its role
#[derive(Debug, Default)]
pub struct Watchers {
    /// Primary mapping from connection ID to role
    mapping: HashMap<Id, Role>,

    /// Reverse mapping organized by role, one room per role
    rooms: EnumMap<Role, HashSet<Id>>,
}

impl Watchers {
    /// Adds a freshly opened connection as unassigned
    pub fn add_watcher(&mut self, watcher_id: Id) {
        if self.mapping.insert(watcher_id, Role::Unassigned).is_none() {
            self.rooms[Role::Unassigned].insert(watcher_id);
        }
    }

    /// Moves a known connection into the room of `role`
    pub fn update_watcher_role(&mut self, watcher_id: Id, role: Role) {
        let Some(old_role) = self.mapping.get(&watcher_id).copied() else {
            return;
        };
        if old_role != role {
            self.rooms[old_role].remove(&watcher_id);
            self.rooms[role].insert(watcher_id);
        }
        self.mapping.insert(watcher_id, role);
    }

    /// Forgets a connection
    ///
    /// # Returns
    ///
    /// The role the connection had, if it was known
    pub fn remove_watcher(&mut self, watcher_id: Id) -> Option<Role> {
        let role = self.mapping.remove(&watcher_id)?;
        self.rooms[role].remove(&watcher_id);
        Some(role)
    }

    /// Gets the role of a connection
    pub fn role(&self, watcher_id: Id) -> Option<Role> {
        self.mapping.get(&watcher_id).copied()
    }

    /// Closes a connection's tunnel, if it still has one
    pub fn remove_watcher_session<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        if let Some(tunnel) = tunnel_finder(watcher_id) {
            tunnel.close();
        }
    }

    /// Sends an event to a single connection
    pub fn send_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(watcher_id) else {
            return;
        };

        session.send_message(message);
    }

    /// Sends personalized events to every connection in the given roles
    ///
    /// The sender is called once per connection and may return `None` to
    /// skip it.
    pub fn announce_with<S, T: Tunnel, F: Fn(Id) -> Option<T>>(&self, sender: S, tunnel_finder: F)
    where
        S: Fn(Id, Role) -> Option<UpdateMessage>,
    {
        for (role, ids) in &self.rooms {
            for id in ids {
                let Some(message) = sender(*id, role) else {
                    continue;
                };
                if let Some(session) = tunnel_finder(*id) {
                    session.send_message(&message);
                }
            }
        }
    }

    /// Sends the same event to every connection in `audience`
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        audience: Audience,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        debug!(?audience, event = message.event_name(), "broadcast event");
        self.announce_with(
            |_, role| audience.includes(role).then(|| message.to_owned()),
            tunnel_finder,
        );
    }
}
