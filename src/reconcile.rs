// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source and target reconciliation.
//!
//! Reconciliation brings a source tree and a target tree in line with one
//! another in one of two directions:
//!
//! - __Install__ copies files from the source into the target.
//! - __Sync__ copies files from the target back into the source, so changes
//!   made to installed files can be committed to the source.
//!
//! # Planning and Execution
//!
//! Work is split into two steps. First, an [`OperationPlan`] is built that
//! lists every file to copy in source form and target form. The plan is
//! built from an explicit listing of names, or from a full scan of the tree
//! that files are copied out of. Any error during planning aborts before a
//! single file is touched.
//!
//! Second, the plan is executed. Every entry is checked up front: the
//! origin must be readable, and the destination must be creatable. Only then
//! are files copied, in plan order. The first file that fails to copy stops
//! execution. Files copied before it are __not__ rolled back. The resulting
//! [`Report`] states which entries went through and which entry caused the
//! abort.
//!
//! # Pitfalls
//!
//! The up-front checks only see the file system as it was at the time they
//! ran. Concurrent changes to either tree, or permission errors that only
//! show up mid-copy, still leave a partially applied plan behind.

mod copy;
mod plan;
mod report;

pub use report::{EntryOutcome, Failure, Outcome, Report};

use crate::{
    conflict::{ConflictError, ConflictResolver},
    mapper::{to_target_name, DOTFILES_DIR},
    scan::ScanError,
};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Direction of copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Copy source form files into the target.
    Install,

    /// Copy target form files back into the source.
    Sync,
}

impl Display for Direction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Install => fmt.write_str("install"),
            Self::Sync => fmt.write_str("sync"),
        }
    }
}

/// Files that a sync without explicit names considers.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    /// Every file of the target tree, dot entries included.
    #[default]
    Target,

    /// Only files the source already has, and that exist in the target.
    Tracked,
}

/// A file named in both source form and target form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    /// Path relative to the source tree.
    pub source_name: PathBuf,

    /// Path relative to the target tree.
    pub target_name: PathBuf,
}

impl FileEntry {
    /// Construct new file entry.
    pub fn new(source_name: impl Into<PathBuf>, target_name: impl Into<PathBuf>) -> Self {
        Self {
            source_name: source_name.into(),
            target_name: target_name.into(),
        }
    }

    /// Construct new file entry from its source form name.
    pub fn from_source_name(source_name: impl Into<PathBuf>) -> Self {
        let source_name = source_name.into();
        let target_name = to_target_name(&source_name);
        Self {
            source_name,
            target_name,
        }
    }

    /// Check if entry is stored in the `.dotfiles` directory of the source.
    pub fn is_dotfile(&self) -> bool {
        self.source_name.starts_with(DOTFILES_DIR) && self.source_name != Path::new(DOTFILES_DIR)
    }
}

/// Ordered listing of files to copy in one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPlan {
    direction: Direction,
    source_dir: PathBuf,
    target_dir: PathBuf,
    entries: Vec<FileEntry>,
    ambiguous: Vec<FileEntry>,
}

impl OperationPlan {
    /// Direction files get copied in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Root of the source tree.
    pub fn source_dir(&self) -> &Path {
        self.source_dir.as_path()
    }

    /// Root of the target tree.
    pub fn target_dir(&self) -> &Path {
        self.target_dir.as_path()
    }

    /// Entries to copy in order.
    pub fn entries(&self) -> &[FileEntry] {
        self.entries.as_slice()
    }

    /// Entries whose destination had to be picked between two candidates.
    ///
    /// The `.dotfiles` form was chosen for every one of them.
    pub fn ambiguous(&self) -> &[FileEntry] {
        self.ambiguous.as_slice()
    }

    /// Number of entries in plan.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if plan has nothing to copy.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Absolute path that an entry is copied from.
    pub fn origin(&self, entry: &FileEntry) -> PathBuf {
        match self.direction {
            Direction::Install => self.source_dir.join(&entry.source_name),
            Direction::Sync => self.target_dir.join(&entry.target_name),
        }
    }

    /// Absolute path that an entry is copied to.
    pub fn destination(&self, entry: &FileEntry) -> PathBuf {
        match self.direction {
            Direction::Install => self.target_dir.join(&entry.target_name),
            Direction::Sync => self.source_dir.join(&entry.source_name),
        }
    }
}

/// Reconcile a source tree with a target tree.
#[derive(Debug, Clone)]
pub struct Reconciler {
    source_dir: PathBuf,
    target_dir: PathBuf,
    sync_scope: SyncScope,
    dry_run: bool,
}

impl Reconciler {
    /// Construct new reconciler between source and target directories.
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            sync_scope: SyncScope::default(),
            dry_run: false,
        }
    }

    /// Select which files a sync without explicit names considers.
    pub fn sync_scope(mut self, scope: SyncScope) -> Self {
        self.sync_scope = scope;
        self
    }

    /// Log and report everything, but do not write anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Root of the source tree.
    pub fn source_dir(&self) -> &Path {
        self.source_dir.as_path()
    }

    /// Root of the target tree.
    pub fn target_dir(&self) -> &Path {
        self.target_dir.as_path()
    }

    /// Build plan of files to copy.
    ///
    /// With no explicit names, the tree that files are copied out of is
    /// scanned in full. Explicit names are in source form for installs, and
    /// in target form for syncs. A name of a directory stands for every file
    /// below it.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::EntryNotFound`] if explicit name is missing.
    /// - Return [`ReconcileError::InvalidName`] if explicit name is absolute,
    ///   or climbs out of its tree.
    /// - Return [`ReconcileError::Scan`] if a tree cannot be scanned.
    #[instrument(skip(self, explicit), level = "debug")]
    pub fn plan(
        &self,
        direction: Direction,
        explicit: impl IntoIterator<Item = impl AsRef<Path>>,
    ) -> Result<OperationPlan> {
        let explicit = explicit
            .into_iter()
            .map(|name| name.as_ref().to_path_buf())
            .collect::<Vec<_>>();

        let plan = plan::Planner::new(self, direction).build(&explicit)?;
        info!(
            "planned {} of {} file(s) between {:?} and {:?}",
            direction,
            plan.len(),
            self.source_dir.display(),
            self.target_dir.display()
        );

        Ok(plan)
    }

    /// Execute plan.
    ///
    /// Existing destination files are overwritten during syncs. Installs ask
    /// the `resolver` first.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::OriginUnreadable`],
    ///   [`ReconcileError::DestinationIsDirectory`],
    ///   [`ReconcileError::ParentNotDirectory`], or
    ///   [`ReconcileError::ParentNotWritable`] if an entry fails its up-front
    ///   check. Nothing is copied in that case.
    ///
    /// Errors hit while copying do not surface here, and are recorded as the
    /// [`Report`] failure instead.
    #[instrument(skip(self, plan, resolver), level = "debug")]
    pub fn execute(
        &self,
        plan: &OperationPlan,
        resolver: &mut impl ConflictResolver,
    ) -> Result<Report> {
        copy::check_preconditions(plan)?;
        Ok(copy::apply(plan, resolver, self.dry_run))
    }
}

/// Reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Explicitly named file is missing from its tree.
    #[error("{:?} does not exist", path.display())]
    EntryNotFound { name: PathBuf, path: PathBuf },

    /// Explicitly named file is not a plain relative path.
    #[error("{:?} is not a relative path inside its tree", name.display())]
    InvalidName { name: PathBuf },

    /// Tree cannot be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// File to copy from cannot be read.
    #[error("cannot read {:?}", path.display())]
    OriginUnreadable {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File to copy to exists as a directory.
    #[error("{:?} exists and is a directory", path.display())]
    DestinationIsDirectory { path: PathBuf },

    /// Part of the destination path exists, but is not a directory.
    #[error("{:?} is in the way and not a directory", path.display())]
    ParentNotDirectory { path: PathBuf },

    /// Directory that would hold the destination cannot be written to.
    #[error("cannot write into {:?}", path.display())]
    ParentNotWritable {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File failed to copy.
    #[error("failed to copy {:?} to {:?}", origin.display(), destination.display())]
    CopyIo {
        #[source]
        source: std::io::Error,
        origin: PathBuf,
        destination: PathBuf,
    },

    /// Overwrite conflict could not be resolved.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Execution stopped part way through.
    #[error("stopped at {:?} after copying {completed} file(s)", path.display())]
    Aborted {
        #[source]
        source: Box<ReconcileError>,
        path: PathBuf,
        completed: usize,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;
