// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile name mapping.
//!
//! A source tree keeps its dot-prefixed configuration files inside a special
//! top-level directory named `.dotfiles`. Everything inside of it is installed
//! into the target with a dot prepended to its leading path component, e.g.,
//! `.dotfiles/config/emacs/init.el` becomes `.config/emacs/init.el`. Anything
//! outside of `.dotfiles` keeps the exact same relative path on both sides.
//!
//! # Mapping Direction
//!
//! Names written in the layout of the source tree are called __source form__,
//! and names written in the layout of the target tree are called
//! __target form__. [`to_target_name`] and [`to_source_name`] translate
//! between the two, and [`sync_destination`] decides where a target file
//! should be written back to during synchronization.

use std::{
    ffi::OsString,
    path::{Component, Path, PathBuf},
};

/// Name of the top-level source directory that stores dot-prefixed files.
pub const DOTFILES_DIR: &str = ".dotfiles";

/// Translate source form name into target form name.
///
/// Strips the leading `.dotfiles` segment and prepends a dot to whatever
/// segment follows it. A bare `.dotfiles` name is left alone, as are
/// names that do not start with `.dotfiles` at all.
pub fn to_target_name(source_name: impl AsRef<Path>) -> PathBuf {
    let source_name = source_name.as_ref();
    let mut components = source_name.components();

    match components.next() {
        Some(Component::Normal(first)) if first == DOTFILES_DIR => {
            let Some(Component::Normal(leading)) = components.next() else {
                return source_name.to_path_buf();
            };

            let mut dotted = OsString::from(".");
            dotted.push(leading);

            let mut target_name = PathBuf::from(dotted);
            target_name.extend(components);
            target_name
        }
        _ => source_name.to_path_buf(),
    }
}

/// Translate target form name into source form name.
///
/// A dot-prefixed leading segment is moved into `.dotfiles` with the dot
/// removed. Anything else maps to itself.
pub fn to_source_name(target_name: impl AsRef<Path>) -> PathBuf {
    let target_name = target_name.as_ref();
    let mut components = target_name.components();

    let Some(Component::Normal(first)) = components.next() else {
        return target_name.to_path_buf();
    };

    // INVARIANT: Only UTF-8 leading segments can be stripped of their dot.
    match first.to_str().and_then(|name| name.strip_prefix('.')) {
        Some(undotted) if !undotted.is_empty() => {
            let mut source_name = PathBuf::from(DOTFILES_DIR);
            source_name.push(undotted);
            source_name.extend(components);
            source_name
        }
        _ => target_name.to_path_buf(),
    }
}

/// Check if leading segment of a relative name starts with a dot.
pub fn is_dot_prefixed(name: impl AsRef<Path>) -> bool {
    match name.as_ref().components().next() {
        Some(Component::Normal(first)) => first.to_string_lossy().starts_with('.'),
        _ => false,
    }
}

/// Source form destination of a synchronized target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDestination {
    /// Source form name to write the target file to.
    pub source_name: PathBuf,

    /// Both a literal dot-prefixed entry and its `.dotfiles` counterpart
    /// claim this target file.
    pub ambiguous: bool,
}

/// Decide where a target file gets written back to inside the source tree.
///
/// Dot-prefixed target names always go into `.dotfiles`, whether or not a
/// counterpart exists there yet. This keeps new dotfiles in the same layout
/// that an install expects. If the source also holds the literal
/// dot-prefixed name at its top-level, then the destination is flagged as
/// ambiguous, but `.dotfiles` still wins.
pub fn sync_destination(
    source_root: impl AsRef<Path>,
    target_name: impl AsRef<Path>,
) -> SyncDestination {
    let target_name = target_name.as_ref();
    if !is_dot_prefixed(target_name) {
        return SyncDestination {
            source_name: target_name.to_path_buf(),
            ambiguous: false,
        };
    }

    let source_name = to_source_name(target_name);
    if source_name == target_name {
        // Leading segment is not valid UTF-8, or is a lone dot.
        return SyncDestination {
            source_name,
            ambiguous: false,
        };
    }

    let literal = source_root.as_ref().join(target_name);
    SyncDestination {
        source_name,
        ambiguous: literal.symlink_metadata().is_ok(),
    }
}
