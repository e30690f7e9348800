//! Configuration constants for the voting coordinator
//!
//! This module contains the validation bounds and gameplay defaults
//! used throughout the crate. Keeping them in one place makes the
//! limits easy to audit and reference from validators.

/// Question catalog constants
pub mod catalog {
    /// Maximum number of questions in a catalog
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum length of a question prompt in characters
    pub const MAX_PROMPT_LENGTH: usize = 200;
    /// Minimum number of answer options per question
    pub const MIN_OPTION_COUNT: usize = 2;
    /// Maximum number of answer options per question
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum length of a single answer option in characters
    pub const MAX_OPTION_LENGTH: usize = 200;
}

/// Voting round constants
pub mod round {
    /// Minimum voting window in seconds
    pub const MIN_VOTING_SECONDS: u64 = 5;
    /// Maximum voting window in seconds
    pub const MAX_VOTING_SECONDS: u64 = 240;
    /// Default voting window in seconds
    pub const DEFAULT_VOTING_SECONDS: u64 = 10;
    /// Grace window in milliseconds for draining in-flight votes after
    /// the countdown elapses, before the round resolves
    pub const GRACE_WINDOW_MILLIS: u64 = 500;
}

/// Game progression constants
pub mod game {
    /// Number of lives the crowd starts with
    pub const STARTING_LIVES: u32 = 3;
    /// Maximum number of simultaneously connected clients
    pub const MAX_CLIENT_COUNT: usize = 1000;
}
