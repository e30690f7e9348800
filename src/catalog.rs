//! Question catalog and data model
//!
//! This module defines the immutable question catalog the game is played
//! against. The catalog is loaded once at startup, validated, and never
//! mutated; option order within a question is significant because it
//! breaks ties in the final tally.

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validates that all answer options of a question are distinct
fn validate_unique_options(options: &[String]) -> garde::Result {
    if options.iter().duplicates().next().is_some() {
        Err(garde::Error::new("answer options must be unique"))
    } else {
        Ok(())
    }
}

/// Validates that every question's correct index points at an existing option
fn validate_correct_indices(questions: &[Question]) -> garde::Result {
    match questions
        .iter()
        .position(|q| q.correct >= q.options.len())
    {
        Some(i) => Err(garde::Error::new(format!(
            "question {i} marks a nonexistent option as correct",
        ))),
        None => Ok(()),
    }
}

/// Errors that can occur when loading a catalog
#[derive(Debug, Error)]
pub enum Error {
    /// The catalog failed structural validation
    #[error("invalid catalog: {0}")]
    Invalid(#[from] garde::Report),
}

/// A single trivia question
///
/// Options are an ordered sequence of two or more unique strings; the
/// `correct` field is an index into that sequence. The record is immutable
/// once loaded.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Question {
    /// The question text shown to the crowd
    #[garde(length(max = crate::constants::catalog::MAX_PROMPT_LENGTH))]
    prompt: String,
    /// The ordered answer options
    #[garde(
        length(min = crate::constants::catalog::MIN_OPTION_COUNT, max = crate::constants::catalog::MAX_OPTION_COUNT),
        inner(length(max = crate::constants::catalog::MAX_OPTION_LENGTH)),
        custom(|v, _| validate_unique_options(v))
    )]
    options: Vec<String>,
    /// Index of the correct option
    #[garde(skip)]
    correct: usize,
}

impl Question {
    /// Creates a question from its parts
    ///
    /// Structural validity is checked when the question is assembled into
    /// a [`Catalog`], not here.
    pub fn new(prompt: impl Into<String>, options: Vec<String>, correct: usize) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            correct,
        }
    }

    /// The question text
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The ordered answer options
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The text of the correct option
    ///
    /// # Panics
    ///
    /// Panics if the question was never validated and the correct index
    /// is out of range; questions obtained from a [`Catalog`] cannot
    /// trigger this.
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct]
    }
}

/// The fixed, ordered question catalog for one game
///
/// Question order defines level order: level `n` asks question `n`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Catalog {
    /// The questions, in level order
    #[garde(
        length(min = 1, max = crate::constants::catalog::MAX_QUESTION_COUNT),
        dive,
        custom(|v, _| validate_correct_indices(v))
    )]
    questions: Vec<Question>,
}

impl Catalog {
    /// Creates a validated catalog from a question list
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] when any question violates the
    /// structural bounds: empty catalog, too few or duplicate options,
    /// overlong text, or a correct index pointing at nothing.
    pub fn new(questions: Vec<Question>) -> Result<Self, Error> {
        let catalog = Self { questions };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Returns the number of questions in the catalog
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Checks if the catalog contains any questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Gets the question for a level, if the level exists
    pub fn get(&self, level: usize) -> Option<&Question> {
        self.questions.get(level)
    }
}
