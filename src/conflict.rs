// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Overwrite conflict handling.
//!
//! An install may find that a file it wants to write already exists in the
//! target. What happens next is decided by an [`OverwriteMode`]. Files are
//! overwritten without question by default. The user can also refuse every
//! overwrite, or be asked about each file in turn.

use inquire::Select;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};
use tracing::{debug, instrument};

/// How to treat destination files that already exist.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteMode {
    /// Overwrite existing files unconditionally.
    #[default]
    Always,

    /// Never overwrite existing files.
    Never,

    /// Ask the user about each existing file.
    Prompt,
}

/// Decide whether an existing destination file gets overwritten.
pub trait ConflictResolver {
    /// Return true if `destination` should be overwritten.
    fn should_overwrite(&mut self, destination: &Path) -> Result<bool>;

    /// Guess the answer of [`should_overwrite`](Self::should_overwrite)
    /// without asking anybody.
    ///
    /// Used by dry runs. Resolvers that would prompt assume the file gets
    /// overwritten.
    fn would_overwrite(&self, _destination: &Path) -> bool {
        true
    }
}

/// Answer to an overwrite prompt.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Answer {
    /// Overwrite this file.
    Yes,

    /// Keep this file.
    No,

    /// Overwrite this file and every file after it.
    All,

    /// Keep this file and every file after it.
    None,
}

impl Display for Answer {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::All => "all",
            Self::None => "none",
        };
        fmt.write_str(label)
    }
}

/// Ask the user about an overwrite.
pub trait OverwritePrompter {
    /// Ask whether `destination` should be overwritten.
    fn ask(&mut self, destination: &Path) -> Result<Answer>;
}

/// Overwrite prompter on the terminal.
#[derive(Debug, Default, Clone)]
pub struct InquirePrompter;

impl OverwritePrompter for InquirePrompter {
    fn ask(&mut self, destination: &Path) -> Result<Answer> {
        let message = format!("Overwrite file {}?", destination.display());
        let answer = Select::new(
            &message,
            vec![Answer::Yes, Answer::No, Answer::All, Answer::None],
        )
        .prompt()?;

        Ok(answer)
    }
}

/// Resolve conflicts according to an [`OverwriteMode`].
///
/// Prompt mode turns into [`OverwriteMode::Always`] or
/// [`OverwriteMode::Never`] once the user answers "all" or "none".
#[derive(Debug, Clone)]
pub struct ConflictPolicy<P = InquirePrompter>
where
    P: OverwritePrompter,
{
    mode: OverwriteMode,
    prompter: P,
}

impl ConflictPolicy {
    /// Construct new conflict policy that prompts on the terminal.
    pub fn new(mode: OverwriteMode) -> Self {
        Self::with_prompter(mode, InquirePrompter)
    }
}

impl<P> ConflictPolicy<P>
where
    P: OverwritePrompter,
{
    /// Construct new conflict policy with custom prompter.
    pub fn with_prompter(mode: OverwriteMode, prompter: P) -> Self {
        Self { mode, prompter }
    }

    /// Current overwrite mode.
    pub fn mode(&self) -> OverwriteMode {
        self.mode
    }
}

impl<P> ConflictResolver for ConflictPolicy<P>
where
    P: OverwritePrompter,
{
    #[instrument(skip(self), level = "debug")]
    fn should_overwrite(&mut self, destination: &Path) -> Result<bool> {
        match self.mode {
            OverwriteMode::Always => Ok(true),
            OverwriteMode::Never => Ok(false),
            OverwriteMode::Prompt => {
                let answer = self.prompter.ask(destination)?;
                debug!("answered {answer} for {:?}", destination.display());
                match answer {
                    Answer::Yes => Ok(true),
                    Answer::No => Ok(false),
                    Answer::All => {
                        self.mode = OverwriteMode::Always;
                        Ok(true)
                    }
                    Answer::None => {
                        self.mode = OverwriteMode::Never;
                        Ok(false)
                    }
                }
            }
        }
    }

    fn would_overwrite(&self, _destination: &Path) -> bool {
        self.mode != OverwriteMode::Never
    }
}

/// Conflict handling error types.
#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    /// Overwrite prompt could not be answered.
    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),
}

/// Friendly result alias :3
pub type Result<T, E = ConflictError> = std::result::Result<T, E>;
