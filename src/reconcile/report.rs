// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Execution reporting.

use crate::reconcile::{Direction, FileEntry, ReconcileError, Result};

use std::fmt::{Display, Formatter, Result as FmtResult};

/// What happened to a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Destination did not exist and was created.
    Created,

    /// Destination existed and was replaced.
    Overwritten,

    /// Destination existed and was left alone.
    Skipped,
}

impl Display for Outcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Created => fmt.write_str("create"),
            Self::Overwritten => fmt.write_str("overwrite"),
            Self::Skipped => fmt.write_str("skip"),
        }
    }
}

/// Outcome of a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    /// Entry that was handled.
    pub entry: FileEntry,

    /// What happened to it.
    pub outcome: Outcome,
}

/// Entry that stopped execution.
#[derive(Debug)]
pub struct Failure {
    /// Entry that failed.
    pub entry: FileEntry,

    /// Why it failed.
    pub error: ReconcileError,
}

/// Result of executing an [`OperationPlan`](crate::reconcile::OperationPlan).
///
/// Lists every entry that was handled in plan order. If execution stopped
/// early, then the entry responsible is kept as the failure, and entries
/// after it are not listed at all.
#[derive(Debug)]
pub struct Report {
    direction: Direction,
    dry_run: bool,
    outcomes: Vec<EntryOutcome>,
    failure: Option<Failure>,
}

impl Report {
    pub(crate) fn new(direction: Direction, dry_run: bool) -> Self {
        Self {
            direction,
            dry_run,
            outcomes: Vec::new(),
            failure: None,
        }
    }

    pub(crate) fn record(&mut self, outcome: EntryOutcome) {
        self.outcomes.push(outcome);
    }

    pub(crate) fn abort(&mut self, failure: Failure) {
        self.failure = Some(failure);
    }

    /// Direction of the executed plan.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Check if nothing was actually written.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Check if every planned entry was handled.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Outcomes of handled entries in plan order.
    pub fn outcomes(&self) -> &[EntryOutcome] {
        self.outcomes.as_slice()
    }

    /// Entry that stopped execution, if any.
    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Count entries with given outcome.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes
            .iter()
            .filter(|handled| handled.outcome == outcome)
            .count()
    }

    /// Turn stopped execution into an error.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::Aborted`] wrapping the failing entry's
    ///   error if execution stopped early.
    pub fn into_result(mut self) -> Result<Self> {
        match self.failure.take() {
            None => Ok(self),
            Some(Failure { entry, error }) => {
                let path = match self.direction {
                    Direction::Install => entry.target_name,
                    Direction::Sync => entry.source_name,
                };
                Err(ReconcileError::Aborted {
                    source: Box::new(error),
                    path,
                    completed: self.count(Outcome::Created) + self.count(Outcome::Overwritten),
                })
            }
        }
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.dry_run {
            fmt.write_str("dry run: ")?;
        }

        write!(
            fmt,
            "{} {} created, {} overwritten, {} skipped",
            self.direction,
            self.count(Outcome::Created),
            self.count(Outcome::Overwritten),
            self.count(Outcome::Skipped),
        )?;

        if let Some(failure) = &self.failure {
            write!(fmt, ", stopped at {:?}", failure.entry.target_name.display())?;
        }

        Ok(())
    }
}
