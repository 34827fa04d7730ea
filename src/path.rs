// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations that putconf works with when the user does not
//! name them explicitly, and compare tree roots with one another.

use std::path::{Path, PathBuf};

/// Determine absolute path to user's home directory.
///
/// Used as the default target tree. Does not check if the path returned
/// actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to the user configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/putconf/config.toml`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("putconf").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Check if both paths name the same directory.
///
/// Both paths are canonicalized first, so symbolic links and relative
/// components do not hide sameness. Paths that cannot be canonicalized are
/// never the same.
pub fn same_dir(lhs: impl AsRef<Path>, rhs: impl AsRef<Path>) -> bool {
    match (lhs.as_ref().canonicalize(), rhs.as_ref().canonicalize()) {
        (Ok(lhs), Ok(rhs)) => lhs == rhs,
        _ => false,
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
