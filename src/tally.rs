//! Vote aggregation for a single round
//!
//! This module counts votes per answer option for the current round only
//! and enforces one vote per voter through a round-scoped set of seen
//! voter identities. Nothing here persists beyond the round; a new round
//! starts from a fresh tally.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::watcher::Id;

/// Reasons a vote is rejected without being counted
///
/// Rejections are protocol noise from phones, recovered by simply not
/// counting the vote; the faulty client is never notified.
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The voter already voted in this round
    #[error("voter already voted this round")]
    DuplicateVoter,
    /// The chosen option is not one of the round's options
    #[error("option is not part of this round")]
    UnknownOption,
}

/// Per-option vote counts for the current round
///
/// Option order is the catalog's option order and is significant: the
/// winner on a tied tally is the first-listed option. Audiences are small
/// enough that ties are a realistic outcome, not a corner case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tally {
    /// The round's answer options, in catalog order
    options: Vec<String>,
    /// Accepted votes per option, indexed like `options`
    counts: Vec<usize>,
    /// Voters who already cast a vote this round
    voter_seen: HashSet<Id>,
}

impl Tally {
    /// Creates an empty tally over the given answer options
    pub fn new(options: Vec<String>) -> Self {
        let counts = vec![0; options.len()];
        Self {
            options,
            counts,
            voter_seen: HashSet::new(),
        }
    }

    /// Records one vote for an option
    ///
    /// # Errors
    ///
    /// * [`RejectReason::UnknownOption`] when the option is not part of
    ///   this round; the voter is not marked as seen.
    /// * [`RejectReason::DuplicateVoter`] when the voter already voted,
    ///   regardless of which option they pick this time.
    pub fn record(&mut self, option: &str, voter: Id) -> Result<(), RejectReason> {
        let index = self
            .options
            .iter()
            .position(|o| o == option)
            .ok_or(RejectReason::UnknownOption)?;

        if !self.voter_seen.insert(voter) {
            return Err(RejectReason::DuplicateVoter);
        }

        self.counts[index] += 1;
        Ok(())
    }

    /// Returns the current option-to-count mapping
    ///
    /// Safe to call at any time, including between `record` calls.
    pub fn snapshot(&self) -> Vec<(&str, usize)> {
        self.options
            .iter()
            .map(String::as_str)
            .zip(self.counts.iter().copied())
            .collect()
    }

    /// Returns the total number of accepted votes
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// The round's answer options, in catalog order
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Returns the winning option, if any votes were cast
    ///
    /// The winner is the option with the highest count; a tie goes to the
    /// first-listed option. Zero votes yield `None`, the no-consensus
    /// outcome.
    pub fn winner(&self) -> Option<&str> {
        let mut best: Option<(usize, usize)> = None;
        for (index, &count) in self.counts.iter().enumerate() {
            if count > 0 && best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((index, count));
            }
        }
        best.map(|(index, _)| self.options[index].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city_tally() -> Tally {
        Tally::new(vec!["Riyadh".to_owned(), "Jeddah".to_owned()])
    }

    #[test]
    fn test_total_counts_accepted_votes_only() {
        let mut tally = city_tally();
        let first = Id::new();

        tally.record("Riyadh", first).unwrap();
        tally.record("Jeddah", Id::new()).unwrap();

        // Neither a replay nor an unknown option changes the total.
        assert_eq!(tally.record("Jeddah", first), Err(RejectReason::DuplicateVoter));
        assert_eq!(
            tally.record("Dammam", Id::new()),
            Err(RejectReason::UnknownOption)
        );

        assert_eq!(tally.total(), 2);
        assert_eq!(
            tally.snapshot(),
            vec![("Riyadh", 1), ("Jeddah", 1)]
        );
    }

    #[test]
    fn test_duplicate_rejected_regardless_of_option() {
        let mut tally = city_tally();
        let voter = Id::new();

        tally.record("Jeddah", voter).unwrap();
        assert_eq!(tally.record("Riyadh", voter), Err(RejectReason::DuplicateVoter));
        assert_eq!(tally.record("Jeddah", voter), Err(RejectReason::DuplicateVoter));

        assert_eq!(tally.total(), 1);
    }

    #[test]
    fn test_unknown_option_does_not_burn_the_voter() {
        let mut tally = city_tally();
        let voter = Id::new();

        assert_eq!(
            tally.record("Mecca", voter),
            Err(RejectReason::UnknownOption)
        );
        // The voter can still cast a valid vote afterwards.
        tally.record("Riyadh", voter).unwrap();
        assert_eq!(tally.total(), 1);
    }

    #[test]
    fn test_winner_majority() {
        let mut tally = city_tally();

        tally.record("Riyadh", Id::new()).unwrap();
        tally.record("Riyadh", Id::new()).unwrap();
        tally.record("Jeddah", Id::new()).unwrap();

        assert_eq!(tally.winner(), Some("Riyadh"));
    }

    #[test]
    fn test_winner_tie_breaks_by_option_order() {
        let mut tally = Tally::new(vec![
            "Abraj Al Bait".to_owned(),
            "Kingdom Centre".to_owned(),
        ]);

        tally.record("Kingdom Centre", Id::new()).unwrap();
        tally.record("Abraj Al Bait", Id::new()).unwrap();

        // Equal counts resolve to the first-listed option, reproducibly.
        for _ in 0..3 {
            assert_eq!(tally.winner(), Some("Abraj Al Bait"));
        }
    }

    #[test]
    fn test_winner_none_on_zero_votes() {
        let tally = city_tally();
        assert_eq!(tally.winner(), None);
        assert_eq!(tally.total(), 0);
    }

    #[test]
    fn test_trailing_option_can_win() {
        let mut tally = city_tally();

        tally.record("Jeddah", Id::new()).unwrap();

        assert_eq!(tally.winner(), Some("Jeddah"));
    }

    #[test]
    fn test_serde_preserves_voter_seen() {
        let mut tally = city_tally();
        let voter = Id::new();
        tally.record("Riyadh", voter).unwrap();

        let serialized = serde_json::to_string(&tally).unwrap();
        let mut deserialized: Tally = serde_json::from_str(&serialized).unwrap();

        assert_eq!(
            deserialized.record("Jeddah", voter),
            Err(RejectReason::DuplicateVoter)
        );
        assert_eq!(deserialized.total(), 1);
    }
}
