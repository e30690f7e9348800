//! Server-side voting coordinator
//!
//! This module contains the aggregate that owns one voting session: the
//! connected-client registry, the current round, and the session options.
//! It routes every incoming event (display requests, voter ballots, due
//! alarms) through one entry point at a time; callers serialize events
//! through a single queue, so the single-flight invariant — at most one
//! Open or Closing round — holds by construction rather than by locking.

use std::{fmt::Debug, time::Duration};

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    round::{AlarmMessage, Round},
    session::Tunnel,
    watcher::{self, Id, Kind, Watchers},
};

type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Validates the length of the voting window
fn validate_voting_duration(val: &Duration) -> ValidationResult {
    validate_duration::<
        { crate::constants::round::MIN_VOTING_SECONDS },
        { crate::constants::round::MAX_VOTING_SECONDS },
    >("voting_duration", val)
}

/// Session configuration options
///
/// These apply to every round the session opens.
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct Options {
    /// Length of the voting window for each round
    #[garde(custom(|v, _| validate_voting_duration(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    voting_duration: Duration,
}

impl Options {
    /// Creates options with the given voting window
    pub fn new(voting_duration: Duration) -> Self {
        Self { voting_duration }
    }
}

impl Default for Options {
    /// Default options use the standard voting window
    fn default() -> Self {
        Self {
            voting_duration: Duration::from_secs(crate::constants::round::DEFAULT_VOTING_SECONDS),
        }
    }
}

/// Conflict returned when a round is requested while one is still active
///
/// This is a caller error, not a crash: the display must wait for the
/// current round to end or reset the session first.
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateConflict {
    /// A round is already Open or Closing
    #[error("a voting round is already active")]
    AlreadyOpen,
}

/// Messages received from connected clients
///
/// Incoming messages are categorized by the sender's role; a message of
/// the wrong category for its sender is dropped before any handling.
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingMessage {
    /// Messages from the game display
    Display(IncomingDisplayMessage),
    /// Messages from a voter
    Voter(IncomingVoterMessage),
}

impl IncomingMessage {
    /// Validates that a message matches the sender's role
    fn follows(&self, sender_kind: Kind) -> bool {
        matches!(
            (self, sender_kind),
            (IncomingMessage::Display(_), Kind::Display)
                | (IncomingMessage::Voter(_), Kind::Voter)
        )
    }
}

/// Messages the display can send
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IncomingDisplayMessage {
    /// Request to open a voting round for a question
    StartVoting {
        /// The display level the question belongs to
        level: usize,
        /// The question text
        question: String,
        /// The answer options, in catalog order
        options: Vec<String>,
    },
    /// Force the session back to idle, discarding any active round
    ResetGame,
}

/// Messages a voter can send
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IncomingVoterMessage {
    /// One vote; one per connection per round
    CastVote {
        /// The chosen option text
        option: String,
    },
}

/// Session-level update messages
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub enum UpdateMessage {
    /// The session was reset to idle
    SessionReset,
    /// (DISPLAY ONLY) A start request was refused because a round is active
    StartRejected,
}

/// Session-level synchronization messages
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub enum SyncMessage {
    /// No round is open; the game is progressing on the display
    Idle,
}

/// The voting session coordinator
///
/// Owns the round and tally exclusively; the display's game progression
/// state never lives here and is only reached through the emitted round
/// lifecycle events.
#[derive(Serialize, Deserialize)]
pub struct Coordinator {
    /// Session configuration
    options: Options,
    /// Registry of connected clients
    pub watchers: Watchers,
    /// The current round, if one was opened and not yet superseded
    round: Option<Round>,
    /// Generation counter stamped onto rounds and their alarms
    generation: u64,
}

impl Debug for Coordinator {
    /// Custom debug implementation that avoids printing the full registry
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("options", &self.options)
            .field("round", &self.round)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a new idle coordinator
    pub fn new(options: Options) -> Self {
        Self {
            options,
            watchers: Watchers::default(),
            round: None,
            generation: 0,
        }
    }

    /// Opens a voting round for a question
    ///
    /// Supersedes a previously resolved round; bumps the generation so
    /// any alarm still pending for the old round lands on nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StateConflict::AlreadyOpen`] while a round is Open or
    /// Closing; the caller must wait for it to resolve or reset first.
    pub fn open_round<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        level: usize,
        question: String,
        options: Vec<String>,
        schedule_message: S,
        tunnel_finder: F,
    ) -> Result<(), StateConflict> {
        if self.round.as_ref().is_some_and(Round::is_active) {
            return Err(StateConflict::AlreadyOpen);
        }

        self.generation += 1;
        let mut round = Round::new(
            level,
            question,
            options,
            self.options.voting_duration,
            self.generation,
        );
        round.open(&self.watchers, schedule_message, tunnel_finder);
        self.round = Some(round);

        Ok(())
    }

    /// Closes the current voting window early
    ///
    /// The round proceeds through the usual grace window before
    /// resolving. A no-op when no round is open.
    pub fn close_round<S: FnMut(crate::AlarmMessage, Duration)>(&mut self, schedule_message: S) {
        if let Some(round) = &mut self.round {
            round.begin_closing(schedule_message);
        }
    }

    /// Forces the session back to idle
    ///
    /// Discards the current round regardless of its phase and bumps the
    /// generation, which neutralizes any countdown or grace alarm still
    /// in flight. Safe to call from any state, any number of times.
    pub fn reset<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        self.round = None;
        self.generation += 1;

        tracing::info!("session reset");

        self.watchers
            .announce(&UpdateMessage::SessionReset.into(), tunnel_finder);
    }

    /// Handles an incoming message from a connected client
    ///
    /// Messages from unknown connections, or messages that do not match
    /// the sender's role, are dropped without side effects.
    pub fn receive_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(crate::AlarmMessage, Duration),
    >(
        &mut self,
        watcher_id: Id,
        message: IncomingMessage,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        let Some(kind) = self.watchers.get_watcher_kind(watcher_id) else {
            return;
        };

        if !message.follows(kind) {
            tracing::debug!(%watcher_id, "message does not match sender role, dropped");
            return;
        }

        match message {
            IncomingMessage::Display(IncomingDisplayMessage::StartVoting {
                level,
                question,
                options,
            }) => {
                if let Err(conflict) =
                    self.open_round(level, question, options, &mut schedule_message, &tunnel_finder)
                {
                    tracing::debug!(%conflict, "start request refused");
                    self.watchers.send_message(
                        &UpdateMessage::StartRejected.into(),
                        watcher_id,
                        &tunnel_finder,
                    );
                }
            }
            IncomingMessage::Display(IncomingDisplayMessage::ResetGame) => {
                self.reset(tunnel_finder);
            }
            IncomingMessage::Voter(IncomingVoterMessage::CastVote { option }) => {
                match &mut self.round {
                    Some(round) => {
                        round.submit_vote(watcher_id, &option, &self.watchers, tunnel_finder);
                    }
                    None => {
                        tracing::debug!(voter = %watcher_id, "vote with no open round dropped");
                    }
                }
            }
        }
    }

    /// Handles a due alarm
    ///
    /// The alarm's generation must match the current round's; an alarm
    /// armed for a round that was since superseded or reset is ignored.
    pub fn receive_alarm<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(crate::AlarmMessage, Duration),
    >(
        &mut self,
        message: &crate::AlarmMessage,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        let crate::AlarmMessage::Round(alarm) = message;
        let AlarmMessage::ProceedFromRound { generation, to: _ } = alarm;

        match &mut self.round {
            Some(round) if round.generation() == *generation => {
                round.receive_alarm(alarm, &self.watchers, &mut schedule_message, tunnel_finder);
            }
            _ => {
                tracing::debug!(generation = *generation, "stale alarm ignored");
            }
        }
    }

    /// Returns the message necessary to synchronize a client's state
    ///
    /// All clients see the same view: idle, the open round with its
    /// remaining time, or the latest resolved outcome.
    pub fn state_message(&self) -> crate::SyncMessage {
        match &self.round {
            Some(round) => round.state_message().into(),
            None => SyncMessage::Idle.into(),
        }
    }

    /// Registers a new client and pushes the current state to it
    ///
    /// The connect-time push is what resynchronizes clients; missed
    /// events are never replayed.
    ///
    /// # Errors
    ///
    /// Returns [`watcher::Error::MaximumClients`] when the connection cap
    /// is reached.
    pub fn add_watcher<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        kind: Kind,
        tunnel_finder: F,
    ) -> Result<(), watcher::Error> {
        self.watchers.add_watcher(watcher_id, kind)?;

        self.watchers
            .send_state(&self.state_message(), watcher_id, tunnel_finder);

        Ok(())
    }

    /// Resynchronizes a reconnecting client
    pub fn update_session<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        if self.watchers.has_watcher(watcher_id) {
            self.watchers
                .send_state(&self.state_message(), watcher_id, tunnel_finder);
        }
    }

    /// Removes a disconnected client from the registry
    pub fn remove_watcher(&mut self, watcher_id: Id) {
        self.watchers.remove_watcher(watcher_id);
    }

    /// The current round, if any
    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }
}
