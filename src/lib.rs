// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Install and synchronize configuration files.
//!
//! Putconf keeps a __source__ tree of configuration files, i.e., a local
//! directory or a cloned Git repository, in line with a __target__ tree,
//! usually the user's home directory. Files can be installed from the source
//! into the target, or synchronized from the target back into the source.
//!
//! # The Dotfiles Directory
//!
//! Storing dot-prefixed files directly in a repository is awkward, because
//! they are hidden and collide with files like `.git` or `.gitignore`. So the
//! source keeps them in a top-level directory named `.dotfiles` without their
//! leading dot instead. On install, `.dotfiles/bashrc` becomes `.bashrc`, and
//! `.dotfiles/config/nvim/init.lua` becomes `.config/nvim/init.lua`. Every
//! other top-level dot-prefixed entry of the source is ignored, unless named
//! explicitly.
//!
//! # See Also
//!
//! 1. [`mapper`] for the naming rules.
//! 2. [`reconcile`] for how files are planned and copied.
//! 3. [`source`] for how remote sources are fetched.

pub mod config;
pub mod conflict;
pub mod mapper;
pub mod path;
pub mod reconcile;
pub mod scan;
pub mod source;

pub use conflict::{ConflictPolicy, ConflictResolver, OverwriteMode};
pub use reconcile::{Direction, FileEntry, OperationPlan, Reconciler, Report, SyncScope};
pub use source::{resolver_for, ResolveOptions, ResolvedSource, SourceSpec};
