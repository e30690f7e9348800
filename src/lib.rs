//! # Voxdash Coordination Library
//!
//! This library provides the coordination core for a crowd-voted,
//! side-scrolling trivia game: one shared display advances through a
//! question catalog while an unbounded, ephemeral crowd of phone voters
//! decides each answer by majority. It handles the voting round
//! lifecycle, vote tallying with anti-replay, fan-out to connected
//! clients, and the display-side progression state machine.
//!
//! The crate is transport-agnostic: clients are reached through the
//! [`session::Tunnel`] trait and timing is driven by alarm messages the
//! embedding server schedules and delivers back. All state transitions
//! are serialized through one event at a time, so the single-flight
//! round invariant holds without locks.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::doc_markdown)]
use serde::{Deserialize, Serialize};

pub mod constants;

pub mod catalog;
pub mod coordinator;
pub mod join;
pub mod progress;
pub mod round;
pub mod session;
pub mod tally;
pub mod watcher;

/// Messages sent to notify clients of state changes
///
/// This enum represents all update messages that can be sent to keep
/// connected clients consistent with the coordinator's state.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum UpdateMessage {
    /// Session-level updates (reset, refused start requests)
    Game(coordinator::UpdateMessage),
    /// Round lifecycle updates (opened, tally, resolved)
    Round(round::UpdateMessage),
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
}

/// Messages sent to synchronize a client's view with the current state
///
/// Sync messages are sent when clients connect or reconnect; a client
/// that missed events is repaired by this push, never by replay.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum SyncMessage {
    /// Session-level state (idle)
    Game(coordinator::SyncMessage),
    /// Round state (open with remaining time, or resolved)
    Round(round::SyncMessage),
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Alarm messages for timed events
///
/// These are handed to the embedding scheduler and delivered back to
/// [`coordinator::Coordinator::receive_alarm`] when due.
#[derive(Debug, Clone, derive_more::From, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Round countdown and grace-window alarms
    Round(round::AlarmMessage),
}
