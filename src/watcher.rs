//! Connected client management
//!
//! This module tracks every client connected to a voting session: the one
//! continuously-running display and the ephemeral crowd of phone voters.
//! It provides fan-out of update messages, targeted state pushes, and the
//! client registry the coordinator consults when routing incoming events.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use super::{SyncMessage, UpdateMessage, session::Tunnel};

/// A unique identifier for a connected client
///
/// Each connection (display or voter) gets a unique ID that persists for
/// the lifetime of that connection. Voter identity is deliberately
/// connection-scoped: there are no accounts and no identity that survives
/// a disconnect.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    /// Creates a new random client ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The role of a connected client
///
/// The display drives the game and requests rounds; voters only cast
/// votes. The coordinator uses the kind to decide which incoming messages
/// a connection is allowed to send and which updates it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Kind {
    /// The single game display client
    Display,
    /// An anonymous phone voter
    Voter,
}

/// Serialization helper for the Watchers struct
#[derive(Deserialize)]
struct WatchersSerde {
    mapping: HashMap<Id, Kind>,
}

/// Registry of all clients connected to a voting session
///
/// This struct tracks connections by ID and role and provides the fan-out
/// primitives the coordinator uses to broadcast lifecycle events and push
/// state to individual clients.
#[derive(Default, Serialize, Deserialize)]
#[serde(from = "WatchersSerde")]
pub struct Watchers {
    /// Primary mapping from client ID to its role
    mapping: HashMap<Id, Kind>,

    /// Reverse mapping organized by role for efficient filtering
    #[serde(skip_serializing)]
    reverse_mapping: EnumMap<Kind, HashSet<Id>>,
}

impl From<WatchersSerde> for Watchers {
    /// Reconstructs the registry from serialized data
    ///
    /// The reverse mapping is derived state and is rebuilt from the
    /// primary mapping rather than serialized.
    fn from(serde: WatchersSerde) -> Self {
        let WatchersSerde { mapping } = serde;
        let mut reverse_mapping: EnumMap<Kind, HashSet<Id>> = EnumMap::default();
        for (id, kind) in &mapping {
            reverse_mapping[*kind].insert(*id);
        }
        Self {
            mapping,
            reverse_mapping,
        }
    }
}

/// Errors that can occur when registering clients
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session has reached the maximum number of connected clients
    #[error("maximum number of clients reached")]
    MaximumClients,
}

impl Watchers {
    /// Gets a vector of all clients with their tunnels and roles
    ///
    /// Clients without an active tunnel are skipped.
    pub fn vec<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) -> Vec<(Id, T, Kind)> {
        self.reverse_mapping
            .values()
            .flat_map(|v| v.iter())
            .filter_map(|x| match (tunnel_finder(*x), self.mapping.get(x)) {
                (Some(t), Some(k)) => Some((*x, t, *k)),
                _ => None,
            })
            .collect_vec()
    }

    /// Gets a vector of clients of a specific role with their tunnels
    pub fn specific_vec<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        filter: Kind,
        tunnel_finder: F,
    ) -> Vec<(Id, T)> {
        self.reverse_mapping[filter]
            .iter()
            .filter_map(|x| tunnel_finder(*x).map(|t| (*x, t)))
            .collect_vec()
    }

    /// Gets the count of registered clients of a specific role
    pub fn specific_count(&self, filter: Kind) -> usize {
        self.reverse_mapping[filter].len()
    }

    /// Registers a new client connection
    ///
    /// # Errors
    ///
    /// Returns `Error::MaximumClients` if registering this client would
    /// exceed the connection cap.
    pub fn add_watcher(&mut self, watcher_id: Id, kind: Kind) -> Result<(), Error> {
        if self.mapping.len() >= crate::constants::game::MAX_CLIENT_COUNT {
            return Err(Error::MaximumClients);
        }

        self.mapping.insert(watcher_id, kind);
        self.reverse_mapping[kind].insert(watcher_id);

        Ok(())
    }

    /// Removes a client from the registry
    ///
    /// Safe to call for IDs that were never registered.
    pub fn remove_watcher(&mut self, watcher_id: Id) {
        if let Some(kind) = self.mapping.remove(&watcher_id) {
            self.reverse_mapping[kind].remove(&watcher_id);
        }
    }

    /// Gets the role of a specific client
    pub fn get_watcher_kind(&self, watcher_id: Id) -> Option<Kind> {
        self.mapping.get(&watcher_id).copied()
    }

    /// Checks if a client is registered
    pub fn has_watcher(&self, watcher_id: Id) -> bool {
        self.mapping.contains_key(&watcher_id)
    }

    /// Sends an update message to a specific client
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

    /// Sends a state synchronization message to a specific client
    pub fn send_state<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &SyncMessage,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(watcher_id) else {
            return;
        };

        session.send_state(message);
    }

    /// Sends personalized messages to all clients using a sender function
    ///
    /// The sender function is called for each connected client and can
    /// return different messages based on the client's ID and role, or
    /// `None` to skip sending.
    pub fn announce_with<S, T: Tunnel, F: Fn(Id) -> Option<T>>(&self, sender: S, tunnel_finder: F)
    where
        S: Fn(Id, Kind) -> Option<super::UpdateMessage>,
    {
        for (watcher, session, kind) in self.vec(tunnel_finder) {
            let Some(message) = sender(watcher, kind) else {
                continue;
            };

            session.send_message(&message);
        }
    }

    /// Broadcasts an update message to every connected client
    ///
    /// Delivery is at-most-once per connection; a client that misses a
    /// broadcast because its tunnel is gone is resynchronized by the
    /// connect-time state push, not by replay.
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &super::UpdateMessage,
        tunnel_finder: F,
    ) {
        self.announce_with(|_, _| Some(message.to_owned()), tunnel_finder);
    }

    /// Sends an update message to all clients of a specific role
    pub fn announce_specific<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        filter: Kind,
        message: &super::UpdateMessage,
        tunnel_finder: F,
    ) {
        for (_, session) in self.specific_vec(filter, tunnel_finder) {
            session.send_message(message);
        }
    }
}
