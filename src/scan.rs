// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tree scanning.
//!
//! Enumerate regular files of a source or target tree as paths relative to
//! the root of that tree.
//!
//! # Top-Level Dot Entries
//!
//! Entries at the top-level of a source tree whose names start with a dot
//! are not configuration files, e.g., `.git` or `.gitignore`. These are
//! skipped, with one exception: the `.dotfiles` directory, whose contents
//! are yielded with their natural relative path like `.dotfiles/bashrc`.
//! Mapping these names to their installed form is left to
//! [`mapper`](crate::mapper).
//!
//! Dot entries below the top-level are always yielded.
//!
//! # Pitfalls
//!
//! Symbolic links are followed as if they were regular entries. The scanner
//! does not track visited directories on its own, so a link pointing back
//! into one of its own parents makes the walker report a loop error, which
//! aborts the scan.

use crate::mapper::DOTFILES_DIR;

use ignore::{DirEntry, Walk, WalkBuilder};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Configure a scan of a tree.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    dot_entries: bool,
    excluded: Vec<PathBuf>,
}

impl Scanner {
    /// Construct new scanner rooted at target directory.
    ///
    /// Top-level dot entries other than `.dotfiles` are skipped by default.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dot_entries: false,
            excluded: Vec::new(),
        }
    }

    /// Allow top-level dot entries to be yielded.
    pub fn dot_entries(mut self, allowed: bool) -> Self {
        self.dot_entries = allowed;
        self
    }

    /// Never descend into given directory.
    ///
    /// Directories are compared by their canonical path, so the directory is
    /// skipped no matter which symbolic link leads into it.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.excluded.push(path.canonicalize().unwrap_or(path));
        self
    }

    /// Start scanning.
    ///
    /// Nothing is read from the file system until the returned iterator is
    /// polled.
    #[instrument(skip(self), fields(root = %self.root.display()), level = "debug")]
    pub fn scan(self) -> Scan {
        let Self {
            root,
            dot_entries,
            excluded,
        } = self;
        debug!("scan {:?} (dot entries: {dot_entries})", root.display());

        let mut builder = WalkBuilder::new(&root);
        builder
            .standard_filters(false)
            .follow_links(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| keep_entry(entry, dot_entries, &excluded));

        Scan {
            walk: builder.build(),
            root,
            done: false,
        }
    }
}

// INVARIANT: Dot filtering only ever applies to direct children of the root.
fn keep_entry(entry: &DirEntry, dot_entries: bool, excluded: &[PathBuf]) -> bool {
    if is_excluded(entry, excluded) {
        debug!("skip excluded subtree {:?}", entry.path().display());
        return false;
    }

    if entry.depth() != 1 || dot_entries {
        return true;
    }

    let name = entry.file_name().to_string_lossy();
    if !name.starts_with('.') {
        return true;
    }

    name == DOTFILES_DIR && entry.path().is_dir()
}

fn is_excluded(entry: &DirEntry, excluded: &[PathBuf]) -> bool {
    if excluded.is_empty() || !entry.file_type().is_some_and(|kind| kind.is_dir()) {
        return false;
    }

    entry
        .path()
        .canonicalize()
        .is_ok_and(|path| excluded.contains(&path))
}

/// Lazy sequence of relative paths to regular files.
///
/// Stops for good after the first error, or after the walk is exhausted.
/// Build a new [`Scanner`] to enumerate the tree again.
pub struct Scan {
    walk: Walk,
    root: PathBuf,
    done: bool,
}

impl Scan {
    /// Root of the tree being scanned.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }
}

impl Iterator for Scan {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let entry = match self.walk.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(ScanError::from_walk(&self.root, err)));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }

            // INVARIANT: Walker only yields paths rooted at our root.
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_path_buf();
            return Some(Ok(relative));
        }
    }
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } => error_path(err),
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}

/// Tree scanning error types.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Directory cannot be read due to its permissions.
    #[error("permission denied while scanning {:?}", path.display())]
    Permission {
        #[source]
        source: ignore::Error,
        path: PathBuf,
    },

    /// Walker failed for any other reason.
    #[error("failed to scan {:?}", root.display())]
    Walk {
        #[source]
        source: ignore::Error,
        root: PathBuf,
    },
}

impl ScanError {
    fn from_walk(root: &Path, err: ignore::Error) -> Self {
        let denied = err
            .io_error()
            .is_some_and(|io| io.kind() == ErrorKind::PermissionDenied);

        if denied {
            let path = error_path(&err).unwrap_or_else(|| root.to_path_buf());
            return Self::Permission { source: err, path };
        }

        Self::Walk {
            source: err,
            root: root.to_path_buf(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ScanError> = std::result::Result<T, E>;
