//! Session registry
//!
//! This module tracks which connection is bound to which participant
//! identity. Registration order is kept because every player list sent to
//! clients is in join order. Identities are not required to be unique: a
//! second connection claiming an identity that is already present is simply
//! added again.

use itertools::Itertools;
use thiserror::Error;

use super::watcher::Id;

/// Errors that can occur when registering participants
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session already holds the maximum number of participants
    #[error("maximum number of participants reached")]
    MaximumParticipants,
}

/// Ordered mapping from connections to participant identities
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: Vec<(Id, String)>,
}

impl SessionRegistry {
    /// Binds `identity` to `connection`
    ///
    /// A connection that is already registered is moved to the end of the
    /// list under its new identity.
    ///
    /// # Errors
    ///
    /// Returns `Error::MaximumParticipants` if the session is full.
    pub fn register(&mut self, connection: Id, identity: String) -> Result<(), Error> {
        let previous = self.entries.iter().position(|(id, _)| *id == connection);

        if previous.is_none() && self.entries.len() >= crate::constants::game::MAX_PLAYER_COUNT
        {
            return Err(Error::MaximumParticipants);
        }

        if let Some(index) = previous {
            self.entries.remove(index);
        }

        self.entries.push((connection, identity));

        Ok(())
    }

    /// Removes the identity bound to `connection`
    ///
    /// # Returns
    ///
    /// The identity that was bound, or `None` if the connection was never
    /// registered (for example an operator connection)
    pub fn unregister(&mut self, connection: Id) -> Option<String> {
        let index = self.entries.iter().position(|(id, _)| *id == connection)?;
        Some(self.entries.remove(index).1)
    }

    /// Registered identities in registration order
    pub fn list(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, identity)| identity.as_str())
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no connection is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every registration
    ///
    /// # Returns
    ///
    /// The connections that were registered
    pub fn clear(&mut self) -> Vec<Id> {
        self.entries.drain(..).map(|(id, _)| id).collect_vec()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    impl SessionRegistry {
        fn identity(&self, connection: Id) -> Option<&str> {
            self.entries
                .iter()
                .find(|(id, _)| *id == connection)
                .map(|(_, identity)| identity.as_str())
        }
    }

    fn listed(registry: &SessionRegistry) -> Vec<String> {
        registry.list().map(str::to_owned).collect()
    }

    #[test]
    fn test_register_keeps_insertion_order() {
        let mut registry = SessionRegistry::default();
        for name in ["alice", "bob", "carol"] {
            registry.register(Id::new(), name.to_string()).unwrap();
        }

        assert_eq!(listed(&registry), ["alice", "bob", "carol"]);
    }

    #[test]
    fn test_unregister_removes_only_that_connection() {
        let mut registry = SessionRegistry::default();
        let alice = Id::new();
        let bob = Id::new();
        let carol = Id::new();
        registry.register(alice, "alice".to_string()).unwrap();
        registry.register(bob, "bob".to_string()).unwrap();
        registry.register(carol, "carol".to_string()).unwrap();

        assert_eq!(registry.unregister(bob), Some("bob".to_string()));
        assert_eq!(listed(&registry), ["alice", "carol"]);
        assert_eq!(registry.identity(carol), Some("carol"));
        assert_eq!(registry.identity(bob), None);
    }

    #[test]
    fn test_unregister_unknown_connection_is_noop() {
        let mut registry = SessionRegistry::default();
        registry.register(Id::new(), "alice".to_string()).unwrap();

        assert_eq!(registry.unregister(Id::new()), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_identity_is_added_again() {
        let mut registry = SessionRegistry::default();
        let first = Id::new();
        let second = Id::new();
        registry.register(first, "alice".to_string()).unwrap();
        registry.register(second, "alice".to_string()).unwrap();

        assert_eq!(listed(&registry), ["alice", "alice"]);

        registry.unregister(first);
        assert_eq!(listed(&registry), ["alice"]);
        assert_eq!(registry.identity(second), Some("alice"));
    }

    #[test]
    fn test_reregistering_connection_moves_it_to_the_end() {
        let mut registry = SessionRegistry::default();
        let alice = Id::new();
        registry.register(alice, "alice".to_string()).unwrap();
        registry.register(Id::new(), "bob".to_string()).unwrap();
        registry.register(alice, "alicia".to_string()).unwrap();

        assert_eq!(listed(&registry), ["bob", "alicia"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_interleaved_joins_and_leaves_track_live_set() {
        let mut registry = SessionRegistry::default();
        let ids = (0..6).map(|_| Id::new()).collect_vec();
        let mut expected: Vec<String> = Vec::new();

        for (i, id) in ids.iter().enumerate() {
            let name = format!("p{i}");
            registry.register(*id, name.clone()).unwrap();
            expected.push(name);
            if i % 2 == 1 {
                let leaving = ids[i - 1];
                let gone = registry.unregister(leaving).unwrap();
                expected.retain(|n| *n != gone);
            }
            assert_eq!(listed(&registry), expected);
        }
    }

    #[test]
    fn test_maximum_participants() {
        let mut registry = SessionRegistry::default();
        for i in 0..crate::constants::game::MAX_PLAYER_COUNT {
            registry.register(Id::new(), format!("p{i}")).unwrap();
        }

        assert_eq!(
            registry.register(Id::new(), "late".to_string()),
            Err(Error::MaximumParticipants)
        );
    }

    #[test]
    fn test_clear_returns_connections() {
        let mut registry = SessionRegistry::default();
        let alice = Id::new();
        registry.register(alice, "alice".to_string()).unwrap();

        assert_eq!(registry.clear(), vec![alice]);
        assert!(registry.is_empty());
    }
}
