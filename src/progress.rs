//! Display-side game progression
//!
//! This module owns the state the display mutates as the game advances:
//! current level, remaining lives, and whether movement is frozen waiting
//! on the crowd. It consumes resolved round outcomes and answers with a
//! directive telling the display what to do next; it never reaches into
//! the coordinator's state, and the coordinator never reaches into it.

use serde::{Deserialize, Serialize};

use super::catalog::Catalog;

/// The phase of the display-side game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// The player can move; no question trigger reached yet
    Running,
    /// A trigger was reached; movement is frozen until the crowd decides
    AwaitingVote,
    /// Every question was answered correctly; terminal until restart
    Won,
}

/// A request to open a voting round, addressed to the coordinator
///
/// Carries the `startVoting` payload for the question at the given level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRequest {
    /// The level being attempted
    pub level: usize,
    /// The question text
    pub question: String,
    /// The answer options, in catalog order
    pub options: Vec<String>,
}

/// What the display should do after a round resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// The crowd was right: unfreeze and run toward the next trigger
    Advance {
        /// The new current level
        level: usize,
    },
    /// The crowd was right on the last question: the game is won
    Won,
    /// The crowd was wrong but lives remain: re-open the same question
    Retry(OpenRequest),
    /// The last life is gone: reset the coordinator and start over
    Restart,
}

/// The game progression controller
///
/// Level, lives, and phase are mutated only here, in response to resolved
/// outcomes or an explicit restart; there is no other writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Controller {
    /// The question catalog, in level order
    catalog: Catalog,
    /// Current level, also the index of the next question
    level: usize,
    /// Remaining lives
    lives: u32,
    /// Current phase
    phase: Phase,
}

impl Controller {
    /// Creates a controller at level 0 with full lives
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            level: 0,
            lives: crate::constants::game::STARTING_LIVES,
            phase: Phase::Running,
        }
    }

    /// Builds the open request for the question at a level
    fn open_request(&self, level: usize) -> Option<OpenRequest> {
        self.catalog.get(level).map(|question| OpenRequest {
            level,
            question: question.prompt().to_owned(),
            options: question.options().to_vec(),
        })
    }

    /// Marks a question trigger as reached
    ///
    /// Freezes movement and returns the round request to forward to the
    /// coordinator. Returns `None` unless the game is `Running`; a
    /// trigger hit while a vote is pending or after winning does nothing.
    pub fn reach_trigger(&mut self) -> Option<OpenRequest> {
        if self.phase != Phase::Running {
            return None;
        }

        let request = self.open_request(self.level)?;
        self.phase = Phase::AwaitingVote;
        Some(request)
    }

    /// Applies a resolved round outcome
    ///
    /// `winning_answer` is the crowd's choice, or `None` when the round
    /// timed out without consensus, which counts as incorrect. Returns
    /// `None` when no vote is pending, so a duplicate or delayed
    /// `votingEnded` cannot advance the game twice.
    pub fn apply_outcome(&mut self, winning_answer: Option<&str>) -> Option<Directive> {
        if self.phase != Phase::AwaitingVote {
            tracing::debug!("outcome received while no vote pending, ignored");
            return None;
        }

        let question = self.catalog.get(self.level)?;
        let correct = winning_answer == Some(question.correct_option());

        if correct {
            self.level += 1;

            if self.level >= self.catalog.len() {
                self.phase = Phase::Won;
                tracing::info!("all levels cleared");
                Some(Directive::Won)
            } else {
                self.phase = Phase::Running;
                tracing::info!(level = self.level, "advanced");
                Some(Directive::Advance { level: self.level })
            }
        } else {
            self.lives -= 1;

            if self.lives == 0 {
                tracing::info!("out of lives, restarting");
                self.restart();
                Some(Directive::Restart)
            } else {
                // Same question again; the crowd gets another attempt.
                tracing::info!(level = self.level, lives = self.lives, "wrong answer");
                Some(Directive::Retry(self.open_request(self.level)?))
            }
        }
    }

    /// Restarts the game from level 0 with full lives
    ///
    /// Also the explicit way out of the terminal `Won` phase.
    pub fn restart(&mut self) {
        self.level = 0;
        self.lives = crate::constants::game::STARTING_LIVES;
        self.phase = Phase::Running;
    }

    /// The current level
    pub fn level(&self) -> usize {
        self.level
    }

    /// The remaining lives
    pub fn lives(&self) -> u32 {
        self.lives
    }

    /// The current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the game has been won
    pub fn won(&self) -> bool {
        self.phase == Phase::Won
    }

    /// Whether a round result is being waited on
    pub fn awaiting_result(&self) -> bool {
        self.phase == Phase::AwaitingVote
    }

    /// Whether the player may move
    pub fn movement_allowed(&self) -> bool {
        self.phase == Phase::Running
    }
}
