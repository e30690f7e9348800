//! Voting round state machine
//!
//! This module implements the lifecycle of one voting round: a window
//! opens for a question, votes stream in from the crowd, the countdown
//! elapses, in-flight votes drain during a short grace window, and the
//! round resolves to exactly one authoritative outcome. Timing is driven
//! by alarm messages the caller schedules and later delivers back;
//! every alarm carries the generation of the round it was armed for, so
//! a timer outlived by its round fires into nothing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::SystemTime;

use crate::{
    session::Tunnel,
    tally::Tally,
    watcher::{Id, Watchers},
};

/// The phase of a voting round
///
/// A round is created in `Open` and only ever moves forward:
/// `Open → Closing → Resolved`. "Idle" is not a phase of a round but the
/// coordinator holding no round at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoundPhase {
    /// Accepting votes, countdown running
    #[default]
    Open,
    /// Countdown elapsed; draining in-flight votes during the grace window
    Closing,
    /// Final tally computed and result emitted; read-only until superseded
    Resolved,
}

/// Alarm messages for timed round transitions
///
/// Scheduled through the caller's scheduler and delivered back to the
/// coordinator when due. The generation ties the alarm to the round it
/// was armed for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Triggers a transition of the round with the given generation
    ProceedFromRound {
        /// Generation of the round this alarm was scheduled for
        generation: u64,
        /// Target phase to transition to
        to: RoundPhase,
    },
}

/// Update messages broadcast during a round's lifecycle
///
/// `winningAnswer` is serialized as an explicit `null` on a no-consensus
/// outcome rather than omitted, so voter clients can key on its presence.
#[serde_with::serde_as]
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum UpdateMessage {
    /// A voting window opened for a question
    VotingStarted {
        /// The question text being voted on
        question: String,
        /// The answer options, in catalog order
        options: Vec<String>,
        /// Length of the voting window
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        time_limit: Duration,
    },
    /// The running total of accepted votes changed
    ///
    /// Deliberately carries no per-option breakdown so undecided voters
    /// are not swayed by the partial tally.
    VoteUpdate {
        /// Number of accepted votes so far
        total_votes: usize,
    },
    /// The round resolved to one authoritative outcome
    VotingEnded {
        /// The winning option, or `None` when nobody voted (no consensus)
        winning_answer: Option<String>,
        /// Total accepted votes in the final tally
        total_votes: usize,
    },
}

/// Synchronization messages for clients joining mid-round
///
/// A voter joining while a round is open must immediately see that voting
/// is live and how much time remains, not just future events.
#[serde_with::serde_as]
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SyncMessage {
    /// A round is currently accepting (or draining) votes
    VotingOpen {
        /// The question text being voted on
        question: String,
        /// The answer options, in catalog order
        options: Vec<String>,
        /// Time left before the window closes
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        remaining: Duration,
        /// Number of accepted votes so far
        total_votes: usize,
    },
    /// The latest round has resolved and no new round has opened yet
    VotingResolved {
        /// The winning option, or `None` for no consensus
        winning_answer: Option<String>,
        /// Total accepted votes in the final tally
        total_votes: usize,
    },
}

/// The authoritative state of one voting round
///
/// Owned exclusively by the coordinator; the display only ever observes
/// it through the emitted lifecycle events.
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// The display level this round belongs to
    level: usize,
    /// The question text being voted on
    prompt: String,
    /// Vote counts and anti-replay set for this round
    tally: Tally,
    /// Length of the voting window
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    time_limit: Duration,
    /// When the window opened
    opened_at: SystemTime,
    /// Current phase of the round
    phase: RoundPhase,
    /// Generation stamp distinguishing this round from superseded ones
    generation: u64,
}

impl Round {
    /// Creates a fresh round in the `Open` phase
    ///
    /// The round is inert until [`Round::open`] announces it and arms the
    /// countdown.
    pub fn new(
        level: usize,
        prompt: String,
        options: Vec<String>,
        time_limit: Duration,
        generation: u64,
    ) -> Self {
        Self {
            level,
            prompt,
            tally: Tally::new(options),
            time_limit,
            opened_at: SystemTime::now(),
            phase: RoundPhase::Open,
            generation,
        }
    }

    /// Announces the opened round and arms the countdown
    pub fn open<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        watchers: &Watchers,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        tracing::info!(
            level = self.level,
            time_limit = ?self.time_limit,
            "voting round opened"
        );

        watchers.announce(
            &UpdateMessage::VotingStarted {
                question: self.prompt.clone(),
                options: self.tally.options().to_vec(),
                time_limit: self.time_limit,
            }
            .into(),
            tunnel_finder,
        );

        schedule_message(
            AlarmMessage::ProceedFromRound {
                generation: self.generation,
                to: RoundPhase::Closing,
            }
            .into(),
            self.time_limit,
        );
    }

    /// Handles one vote from a voter
    ///
    /// While `Open`, accepted votes are tallied and the running total is
    /// broadcast. While `Closing`, in-flight votes still drain into the
    /// tally but no update is emitted. Once `Resolved`, votes are dropped
    /// silently; the slow client is not told, only the log is.
    pub fn submit_vote<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        voter: Id,
        option: &str,
        watchers: &Watchers,
        tunnel_finder: F,
    ) {
        match self.phase {
            RoundPhase::Open => match self.tally.record(option, voter) {
                Ok(()) => {
                    watchers.announce(
                        &UpdateMessage::VoteUpdate {
                            total_votes: self.tally.total(),
                        }
                        .into(),
                        tunnel_finder,
                    );
                }
                Err(reason) => {
                    tracing::debug!(%voter, %reason, "vote rejected");
                }
            },
            RoundPhase::Closing => match self.tally.record(option, voter) {
                Ok(()) => {
                    tracing::debug!(%voter, "vote drained during grace window");
                }
                Err(reason) => {
                    tracing::debug!(%voter, %reason, "vote rejected");
                }
            },
            RoundPhase::Resolved => {
                tracing::debug!(%voter, level = self.level, "late vote dropped");
            }
        }
    }

    /// Closes the voting window and arms the grace timer
    ///
    /// Called when the countdown alarm fires, or early on an explicit
    /// close request. A no-op unless the round is `Open`.
    pub fn begin_closing<S: FnMut(crate::AlarmMessage, Duration)>(&mut self, mut schedule_message: S) {
        if self.change_phase(RoundPhase::Open, RoundPhase::Closing) {
            tracing::info!(level = self.level, "voting window closed, draining in-flight votes");

            schedule_message(
                AlarmMessage::ProceedFromRound {
                    generation: self.generation,
                    to: RoundPhase::Resolved,
                }
                .into(),
                Duration::from_millis(crate::constants::round::GRACE_WINDOW_MILLIS),
            );
        }
    }

    /// Computes the final outcome and broadcasts it
    ///
    /// A no-op unless the round is `Closing`, which keeps duplicate or
    /// delayed grace alarms from emitting a second result.
    pub fn resolve<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watchers: &Watchers,
        tunnel_finder: F,
    ) {
        if self.change_phase(RoundPhase::Closing, RoundPhase::Resolved) {
            let winning_answer = self.tally.winner().map(str::to_owned);
            let total_votes = self.tally.total();

            match &winning_answer {
                Some(winner) => {
                    tracing::info!(level = self.level, winner, total_votes, "round resolved");
                }
                None => {
                    tracing::info!(level = self.level, "round resolved without consensus");
                }
            }

            watchers.announce(
                &UpdateMessage::VotingEnded {
                    winning_answer,
                    total_votes,
                }
                .into(),
                tunnel_finder,
            );
        }
    }

    /// Handles a due alarm for this round
    ///
    /// The coordinator has already verified the alarm's generation; this
    /// method only dispatches on the target phase, and the phase guards
    /// make a redundant alarm harmless.
    pub fn receive_alarm<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(crate::AlarmMessage, Duration)>(
        &mut self,
        message: &AlarmMessage,
        watchers: &Watchers,
        schedule_message: &mut S,
        tunnel_finder: F,
    ) {
        let AlarmMessage::ProceedFromRound { generation: _, to } = message;

        match to {
            RoundPhase::Closing => {
                self.begin_closing(schedule_message);
            }
            RoundPhase::Resolved => {
                self.resolve(watchers, tunnel_finder);
            }
            RoundPhase::Open => (),
        }
    }

    /// Attempts to transition from one phase to another
    ///
    /// Returns `true` if the transition happened; `false` leaves the
    /// round untouched when the current phase does not match.
    fn change_phase(&mut self, before: RoundPhase, after: RoundPhase) -> bool {
        if self.phase == before {
            self.phase = after;

            true
        } else {
            false
        }
    }

    /// The current phase of the round
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Whether the round still occupies the single voting slot
    ///
    /// A round is active while `Open` or `Closing`; a `Resolved` round is
    /// retained read-only until superseded.
    pub fn is_active(&self) -> bool {
        !matches!(self.phase, RoundPhase::Resolved)
    }

    /// The generation stamp of this round
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The display level this round belongs to
    pub fn level(&self) -> usize {
        self.level
    }

    /// Time left before the voting window closes
    fn remaining(&self) -> Duration {
        let elapsed = self.opened_at.elapsed().unwrap_or_default();
        self.time_limit.saturating_sub(elapsed)
    }

    /// Builds the sync message describing the round's current state
    ///
    /// Sent to clients connecting or reconnecting mid-round so they see
    /// the live window and its remaining time instead of a replay.
    pub fn state_message(&self) -> SyncMessage {
        match self.phase {
            RoundPhase::Open => SyncMessage::VotingOpen {
                question: self.prompt.clone(),
                options: self.tally.options().to_vec(),
                remaining: self.remaining(),
                total_votes: self.tally.total(),
            },
            RoundPhase::Closing => SyncMessage::VotingOpen {
                question: self.prompt.clone(),
                options: self.tally.options().to_vec(),
                remaining: Duration::ZERO,
                total_votes: self.tally.total(),
            },
            RoundPhase::Resolved => SyncMessage::VotingResolved {
                winning_answer: self.tally.winner().map(str::to_owned),
                total_votes: self.tally.total(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::watcher::Kind;

    #[derive(Debug, Clone)]
    struct MockTunnel {
        messages: Arc<Mutex<Vec<crate::UpdateMessage>>>,
    }

    impl MockTunnel {
        fn new() -> Self {
            Self {
                messages: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn messages(&self) -> Vec<crate::UpdateMessage> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl Tunnel for MockTunnel {
        fn send_message(&self, message: &crate::UpdateMessage) {
            self.messages.lock().unwrap().push(message.clone());
        }

        fn send_state(&self, _state: &crate::SyncMessage) {}

        fn close(self) {}
    }

    struct Fixture {
        watchers: Watchers,
        tunnels: HashMap<Id, MockTunnel>,
        display: Id,
    }

    impl Fixture {
        fn new(voter_count: usize) -> Self {
            let mut watchers = Watchers::default();
            let mut tunnels = HashMap::new();

            let display = Id::new();
            watchers.add_watcher(display, Kind::Display).unwrap();
            tunnels.insert(display, MockTunnel::new());

            for _ in 0..voter_count {
                let voter = Id::new();
                watchers.add_watcher(voter, Kind::Voter).unwrap();
                tunnels.insert(voter, MockTunnel::new());
            }

            Self {
                watchers,
                tunnels,
                display,
            }
        }

        fn finder(&self) -> impl Fn(Id) -> Option<MockTunnel> + '_ {
            |id| self.tunnels.get(&id).cloned()
        }

        fn display_messages(&self) -> Vec<crate::UpdateMessage> {
            self.tunnels[&self.display].messages()
        }
    }

    fn city_round() -> Round {
        Round::new(
            0,
            "What is the capital of Saudi Arabia?".to_owned(),
            vec!["Riyadh".to_owned(), "Jeddah".to_owned()],
            Duration::from_secs(10),
            1,
        )
    }

    fn last_votes_ended(messages: &[crate::UpdateMessage]) -> Option<(Option<String>, usize)> {
        messages.iter().rev().find_map(|m| match m {
            crate::UpdateMessage::Round(UpdateMessage::VotingEnded {
                winning_answer,
                total_votes,
            }) => Some((winning_answer.clone(), *total_votes)),
            _ => None,
        })
    }

    #[test]
    fn test_open_announces_and_arms_countdown() {
        let fixture = Fixture::new(2);
        let mut round = city_round();

        let mut scheduled = Vec::new();
        round.open(
            &fixture.watchers,
            |msg, duration| scheduled.push((msg, duration)),
            fixture.finder(),
        );

        assert_eq!(round.phase(), RoundPhase::Open);
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].1, Duration::from_secs(10));
        assert!(matches!(
            scheduled[0].0,
            crate::AlarmMessage::Round(AlarmMessage::ProceedFromRound {
                generation: 1,
                to: RoundPhase::Closing,
            })
        ));

        let messages = fixture.display_messages();
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            &messages[0],
            crate::UpdateMessage::Round(UpdateMessage::VotingStarted { question, time_limit, .. })
                if question == "What is the capital of Saudi Arabia?"
                    && *time_limit == Duration::from_secs(10)
        ));
    }

    #[test]
    fn test_accepted_vote_broadcasts_running_total_only() {
        let fixture = Fixture::new(1);
        let mut round = city_round();

        round.submit_vote(Id::new(), "Riyadh", &fixture.watchers, fixture.finder());
        round.submit_vote(Id::new(), "Jeddah", &fixture.watchers, fixture.finder());

        let totals: Vec<usize> = fixture
            .display_messages()
            .iter()
            .filter_map(|m| match m {
                crate::UpdateMessage::Round(UpdateMessage::VoteUpdate { total_votes }) => {
                    Some(*total_votes)
                }
                _ => None,
            })
            .collect();

        assert_eq!(totals, vec![1, 2]);
    }

    #[test]
    fn test_rejected_vote_emits_nothing() {
        let fixture = Fixture::new(1);
        let mut round = city_round();
        let voter = Id::new();

        round.submit_vote(voter, "Riyadh", &fixture.watchers, fixture.finder());
        round.submit_vote(voter, "Riyadh", &fixture.watchers, fixture.finder());
        round.submit_vote(Id::new(), "Dammam", &fixture.watchers, fixture.finder());

        let update_count = fixture
            .display_messages()
            .iter()
            .filter(|m| {
                matches!(
                    m,
                    crate::UpdateMessage::Round(UpdateMessage::VoteUpdate { .. })
                )
            })
            .count();

        assert_eq!(update_count, 1);
    }

    #[test]
    fn test_countdown_then_grace_resolves_with_majority() {
        let fixture = Fixture::new(3);
        let mut round = city_round();

        for _ in 0..3 {
            round.submit_vote(Id::new(), "Riyadh", &fixture.watchers, fixture.finder());
        }
        for _ in 0..2 {
            round.submit_vote(Id::new(), "Jeddah", &fixture.watchers, fixture.finder());
        }

        let mut scheduled = Vec::new();
        round.begin_closing(|msg, duration| scheduled.push((msg, duration)));
        assert_eq!(round.phase(), RoundPhase::Closing);
        assert_eq!(
            scheduled[0].1,
            Duration::from_millis(crate::constants::round::GRACE_WINDOW_MILLIS)
        );

        round.resolve(&fixture.watchers, fixture.finder());
        assert_eq!(round.phase(), RoundPhase::Resolved);
        assert!(!round.is_active());

        assert_eq!(
            last_votes_ended(&fixture.display_messages()),
            Some((Some("Riyadh".to_owned()), 5))
        );
    }

    #[test]
    fn test_closing_drains_votes_without_updates() {
        let fixture = Fixture::new(1);
        let mut round = city_round();

        round.submit_vote(Id::new(), "Jeddah", &fixture.watchers, fixture.finder());
        round.begin_closing(|_, _| {});

        // In-flight vote arrives during the grace window: counted, silent.
        round.submit_vote(Id::new(), "Riyadh", &fixture.watchers, fixture.finder());
        round.submit_vote(Id::new(), "Riyadh", &fixture.watchers, fixture.finder());

        let update_count = fixture
            .display_messages()
            .iter()
            .filter(|m| {
                matches!(
                    m,
                    crate::UpdateMessage::Round(UpdateMessage::VoteUpdate { .. })
                )
            })
            .count();
        assert_eq!(update_count, 1);

        round.resolve(&fixture.watchers, fixture.finder());
        assert_eq!(
            last_votes_ended(&fixture.display_messages()),
            Some((Some("Riyadh".to_owned()), 3))
        );
    }

    #[test]
    fn test_votes_after_resolution_are_dropped() {
        let fixture = Fixture::new(1);
        let mut round = city_round();

        round.begin_closing(|_, _| {});
        round.resolve(&fixture.watchers, fixture.finder());

        round.submit_vote(Id::new(), "Riyadh", &fixture.watchers, fixture.finder());

        assert_eq!(
            last_votes_ended(&fixture.display_messages()),
            Some((None, 0))
        );
        assert!(matches!(
            round.state_message(),
            SyncMessage::VotingResolved {
                winning_answer: None,
                total_votes: 0,
            }
        ));
    }

    #[test]
    fn test_zero_votes_resolve_to_no_consensus() {
        let fixture = Fixture::new(2);
        let mut round = city_round();

        round.begin_closing(|_, _| {});
        round.resolve(&fixture.watchers, fixture.finder());

        assert_eq!(
            last_votes_ended(&fixture.display_messages()),
            Some((None, 0))
        );
    }

    #[test]
    fn test_resolve_requires_closing_phase() {
        let fixture = Fixture::new(1);
        let mut round = city_round();

        // A grace alarm that somehow arrives before the countdown alarm
        // must not resolve an open round.
        round.resolve(&fixture.watchers, fixture.finder());

        assert_eq!(round.phase(), RoundPhase::Open);
        assert!(last_votes_ended(&fixture.display_messages()).is_none());
    }

    #[test]
    fn test_double_resolution_emits_one_result() {
        let fixture = Fixture::new(1);
        let mut round = city_round();
        round.submit_vote(Id::new(), "Riyadh", &fixture.watchers, fixture.finder());

        round.begin_closing(|_, _| {});
        round.resolve(&fixture.watchers, fixture.finder());
        round.resolve(&fixture.watchers, fixture.finder());

        let ended_count = fixture
            .display_messages()
            .iter()
            .filter(|m| {
                matches!(
                    m,
                    crate::UpdateMessage::Round(UpdateMessage::VotingEnded { .. })
                )
            })
            .count();
        assert_eq!(ended_count, 1);
    }

    #[test]
    fn test_state_message_reports_remaining_time() {
        let round = city_round();

        match round.state_message() {
            SyncMessage::VotingOpen {
                question,
                options,
                remaining,
                total_votes,
            } => {
                assert_eq!(question, "What is the capital of Saudi Arabia?");
                assert_eq!(options, vec!["Riyadh".to_owned(), "Jeddah".to_owned()]);
                assert!(remaining <= Duration::from_secs(10));
                assert!(remaining > Duration::from_secs(8));
                assert_eq!(total_votes, 0);
            }
            other => panic!("expected VotingOpen sync, got {other:?}"),
        }
    }

    #[test]
    fn test_alarm_dispatch_walks_phases() {
        let fixture = Fixture::new(1);
        let mut round = city_round();

        let mut schedule = |_: crate::AlarmMessage, _: Duration| {};

        round.receive_alarm(
            &AlarmMessage::ProceedFromRound {
                generation: 1,
                to: RoundPhase::Closing,
            },
            &fixture.watchers,
            &mut schedule,
            fixture.finder(),
        );
        assert_eq!(round.phase(), RoundPhase::Closing);

        round.receive_alarm(
            &AlarmMessage::ProceedFromRound {
                generation: 1,
                to: RoundPhase::Resolved,
            },
            &fixture.watchers,
            &mut schedule,
            fixture.finder(),
        );
        assert_eq!(round.phase(), RoundPhase::Resolved);
    }

    #[test]
    fn test_wire_shape_of_voting_ended() {
        let message: crate::UpdateMessage = UpdateMessage::VotingEnded {
            winning_answer: Some("Riyadh".to_owned()),
            total_votes: 5,
        }
        .into();

        let json = message.to_message();
        assert!(json.contains("votingEnded"));
        assert!(json.contains("winningAnswer"));
        assert!(json.contains("totalVotes"));
    }
}
