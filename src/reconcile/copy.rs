// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Plan execution.
//!
//! Check every entry of a plan before copying anything, then copy entries
//! in order until one of them fails.

use crate::{
    conflict::ConflictResolver,
    reconcile::{
        Direction, EntryOutcome, Failure, OperationPlan, Outcome, ReconcileError, Report, Result,
    },
};

use std::{
    collections::HashSet,
    fs::{copy, create_dir_all, File},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

#[instrument(skip(plan), level = "debug")]
pub(super) fn check_preconditions(plan: &OperationPlan) -> Result<()> {
    let mut writable = HashSet::new();

    for entry in plan.entries() {
        let origin = plan.origin(entry);
        File::open(&origin).map_err(|err| ReconcileError::OriginUnreadable {
            source: err,
            path: origin.clone(),
        })?;

        let destination = plan.destination(entry);
        if destination.is_dir() {
            return Err(ReconcileError::DestinationIsDirectory { path: destination });
        }

        let ancestor = nearest_existing_ancestor(&destination)?;
        if writable.contains(&ancestor) {
            continue;
        }

        // INVARIANT: Probe with an unnamed temporary file, nothing is left behind.
        tempfile::tempfile_in(&ancestor).map_err(|err| ReconcileError::ParentNotWritable {
            source: err,
            path: ancestor.clone(),
        })?;
        debug!("{:?} is writable", ancestor.display());
        writable.insert(ancestor);
    }

    Ok(())
}

fn nearest_existing_ancestor(destination: &Path) -> Result<PathBuf> {
    let mut ancestors = destination.ancestors().skip(1);
    let ancestor = ancestors
        .find(|path| path.symlink_metadata().is_ok())
        .unwrap_or(Path::new("."));

    if !ancestor.is_dir() {
        return Err(ReconcileError::ParentNotDirectory {
            path: ancestor.to_path_buf(),
        });
    }

    Ok(ancestor.to_path_buf())
}

#[instrument(skip(plan, resolver), level = "debug")]
pub(super) fn apply(
    plan: &OperationPlan,
    resolver: &mut impl ConflictResolver,
    dry_run: bool,
) -> Report {
    let mut report = Report::new(plan.direction(), dry_run);

    for entry in plan.entries() {
        let origin = plan.origin(entry);
        let destination = plan.destination(entry);

        match copy_entry(plan.direction(), &origin, &destination, resolver, dry_run) {
            Ok(outcome) => report.record(EntryOutcome {
                entry: entry.clone(),
                outcome,
            }),
            Err(error) => {
                report.abort(Failure {
                    entry: entry.clone(),
                    error,
                });
                break;
            }
        }
    }

    report
}

fn copy_entry(
    direction: Direction,
    origin: &Path,
    destination: &Path,
    resolver: &mut impl ConflictResolver,
    dry_run: bool,
) -> Result<Outcome> {
    let exists = destination.exists();
    if exists && is_same_file(origin, destination) {
        info!(
            "{:?} already is {:?}, skip",
            destination.display(),
            origin.display()
        );
        return Ok(Outcome::Skipped);
    }

    let outcome = if exists {
        Outcome::Overwritten
    } else {
        Outcome::Created
    };

    // INVARIANT: Dry runs never prompt.
    if dry_run {
        let refused = exists
            && direction == Direction::Install
            && !resolver.would_overwrite(destination);
        let outcome = if refused { Outcome::Skipped } else { outcome };
        info!("would {outcome} {:?}", destination.display());
        return Ok(outcome);
    }

    if exists && direction == Direction::Install && !resolver.should_overwrite(destination)? {
        info!("do not overwrite {:?}", destination.display());
        return Ok(Outcome::Skipped);
    }

    let copy_io = |err| ReconcileError::CopyIo {
        source: err,
        origin: origin.to_path_buf(),
        destination: destination.to_path_buf(),
    };

    if let Some(parent) = destination.parent() {
        create_dir_all(parent).map_err(copy_io)?;
    }

    // INVARIANT: Permission bits, executable bit included, travel with the bytes.
    copy(origin, destination).map_err(copy_io)?;
    info!("{outcome} {:?}", destination.display());

    Ok(outcome)
}

// INVARIANT: Copying a file onto itself truncates it before it is read.
fn is_same_file(origin: &Path, destination: &Path) -> bool {
    match (origin.canonicalize(), destination.canonicalize()) {
        (Ok(origin), Ok(destination)) => origin == destination,
        _ => false,
    }
}
