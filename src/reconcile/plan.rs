// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operation planning.
//!
//! Turn explicit names, or a full scan of a tree, into an [`OperationPlan`].

use crate::{
    mapper::sync_destination,
    path::same_dir,
    reconcile::{Direction, FileEntry, OperationPlan, ReconcileError, Reconciler, Result, SyncScope},
    scan::Scanner,
};

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, warn};

pub(super) struct Planner<'a> {
    source_dir: &'a Path,
    target_dir: &'a Path,
    sync_scope: SyncScope,
    direction: Direction,
    entries: Vec<FileEntry>,
    ambiguous: Vec<FileEntry>,
    destinations: HashMap<PathBuf, usize>,
}

impl<'a> Planner<'a> {
    pub(super) fn new(reconciler: &'a Reconciler, direction: Direction) -> Self {
        Self {
            source_dir: reconciler.source_dir(),
            target_dir: reconciler.target_dir(),
            sync_scope: reconciler.sync_scope,
            direction,
            entries: Vec::new(),
            ambiguous: Vec::new(),
            destinations: HashMap::new(),
        }
    }

    pub(super) fn build(mut self, explicit: &[PathBuf]) -> Result<OperationPlan> {
        match (self.direction, explicit.is_empty()) {
            (Direction::Install, true) => self.scan_source(false)?,
            (Direction::Sync, true) => match self.sync_scope {
                SyncScope::Target => self.scan_target()?,
                SyncScope::Tracked => self.scan_source(true)?,
            },
            (_, false) => {
                for name in explicit {
                    self.add_explicit(name)?;
                }
            }
        }

        Ok(OperationPlan {
            direction: self.direction,
            source_dir: self.source_dir.to_path_buf(),
            target_dir: self.target_dir.to_path_buf(),
            entries: self.entries,
            ambiguous: self.ambiguous,
        })
    }

    // INVARIANT: Never walk into the other tree, even through a symbolic link.
    fn scanner(&self, root: PathBuf) -> Scanner {
        let mut scanner = Scanner::new(&root);
        for other in [self.source_dir, self.target_dir] {
            if !same_dir(&root, other) {
                scanner = scanner.exclude(other);
            }
        }

        scanner
    }

    fn scan_source(&mut self, tracked_only: bool) -> Result<()> {
        let scanner = self.scanner(self.source_dir.to_path_buf());
        for name in scanner.scan() {
            let entry = FileEntry::from_source_name(name?);
            if tracked_only && !self.target_dir.join(&entry.target_name).is_file() {
                debug!("skip {:?}, not in target", entry.target_name.display());
                continue;
            }

            self.push(entry);
        }

        Ok(())
    }

    fn scan_target(&mut self) -> Result<()> {
        let scanner = self.scanner(self.target_dir.to_path_buf()).dot_entries(true);
        for name in scanner.scan() {
            self.push_synced(name?);
        }

        Ok(())
    }

    fn add_explicit(&mut self, name: &Path) -> Result<()> {
        let name = normalize_name(name)?;
        let root = match self.direction {
            Direction::Install => self.source_dir,
            Direction::Sync => self.target_dir,
        };
        let path = root.join(&name);

        if path.is_dir() {
            debug!("expand explicit directory {:?}", path.display());
            let scanner = self.scanner(path).dot_entries(true);
            for relative in scanner.scan() {
                self.push_named(name.join(relative?));
            }
        } else if path.is_file() {
            self.push_named(name);
        } else {
            return Err(ReconcileError::EntryNotFound { name, path });
        }

        Ok(())
    }

    fn push_named(&mut self, name: PathBuf) {
        match self.direction {
            Direction::Install => self.push(FileEntry::from_source_name(name)),
            Direction::Sync => self.push_synced(name),
        }
    }

    fn push_synced(&mut self, target_name: PathBuf) {
        let destination = sync_destination(self.source_dir, &target_name);
        let entry = FileEntry::new(destination.source_name, target_name);
        if destination.ambiguous {
            warn!(
                "both {:?} and {:?} exist in source, syncing into the latter",
                entry.target_name.display(),
                entry.source_name.display()
            );
            self.ambiguous.push(entry.clone());
        }

        self.push(entry);
    }

    // INVARIANT: One entry per destination, and `.dotfiles` entries win collisions.
    fn push(&mut self, entry: FileEntry) {
        let destination = match self.direction {
            Direction::Install => entry.target_name.clone(),
            Direction::Sync => entry.source_name.clone(),
        };

        let Some(&index) = self.destinations.get(&destination) else {
            self.destinations.insert(destination, self.entries.len());
            self.entries.push(entry);
            return;
        };

        let existing = &self.entries[index];
        if *existing == entry {
            return;
        }

        warn!(
            "both {:?} and {:?} map to {:?}",
            existing.source_name.display(),
            entry.source_name.display(),
            destination.display()
        );
        if entry.is_dotfile() && !existing.is_dotfile() {
            self.ambiguous.push(self.entries[index].clone());
            self.entries[index] = entry;
        } else {
            self.ambiguous.push(entry);
        }
    }
}

fn normalize_name(name: &Path) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => continue,
            _ => {
                return Err(ReconcileError::InvalidName {
                    name: name.to_path_buf(),
                })
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(ReconcileError::InvalidName {
            name: name.to_path_buf(),
        });
    }

    Ok(normalized)
}
