// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source tree resolution.
//!
//! The user names a source tree either as a path to a local directory, or as
//! the URL of a remote Git repository. Either way, the reconciliation engine
//! only ever deals with a local directory. Resolution turns the user's
//! [`SourceSpec`] into a [`ResolvedSource`] that is guaranteed to be a
//! readable directory at the time of resolution.
//!
//! # Remote Sources
//!
//! Remote sources are cloned into a fresh temporary directory on every
//! invocation. There is no caching between invocations. The temporary working
//! copy is owned by the [`ResolvedSource`], and is removed once it is dropped
//! unless [`ResolvedSource::keep`] is called.
//!
//! Local sources can also be cloned when the user asks for a specific branch,
//! tag, or commit. The user's own working copy is never switched to another
//! reference behind their back.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Config, FetchOptions, Object, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_dir,
    path::{Path, PathBuf},
    process::Command,
    str::FromStr,
    time,
};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

/// Transports that name a remote repository.
const REMOTE_SCHEMES: [&str; 4] = ["http", "https", "ssh", "git"];

/// User supplied location of the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Directory on the local file system.
    Local(PathBuf),

    /// URL of a remote Git repository.
    Remote(String),
}

impl SourceSpec {
    /// Check if source must be fetched from a remote.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl FromStr for SourceSpec {
    type Err = SourceError;

    /// Parse source specifier.
    ///
    /// - `<scheme>://...` with scheme `http`, `https`, `ssh`, or `git` is
    ///   remote.
    /// - `file://<path>` is the local path `<path>`.
    /// - `user@host:path` is remote, unless a local path of that exact name
    ///   exists.
    /// - Anything else is a local path.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError::UnsupportedTransport`] for any other scheme.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        if let Some((scheme, rest)) = spec.split_once("://") {
            if scheme == "file" {
                return Ok(Self::Local(PathBuf::from(rest)));
            }

            if REMOTE_SCHEMES.contains(&scheme) {
                return Ok(Self::Remote(spec.to_string()));
            }

            if !scheme.is_empty() && scheme.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(SourceError::UnsupportedTransport {
                    scheme: scheme.to_string(),
                });
            }
        }

        if is_scp_like(spec) && !Path::new(spec).exists() {
            return Ok(Self::Remote(spec.to_string()));
        }

        Ok(Self::Local(PathBuf::from(spec)))
    }
}

impl Display for SourceSpec {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Local(path) => fmt.write_str(path.to_string_lossy().as_ref()),
            Self::Remote(url) => fmt.write_str(url),
        }
    }
}

// INVARIANT: Git only treats "host:path" as scp-like if no slash comes before the colon.
fn is_scp_like(spec: &str) -> bool {
    let Some((host, path)) = spec.split_once(':') else {
        return false;
    };

    host.contains('@') && !host.contains('/') && !path.is_empty()
}

/// Local directory holding the source tree.
#[derive(Debug)]
pub struct ResolvedSource {
    path: PathBuf,
    working_copy: Option<TempDir>,
}

impl ResolvedSource {
    /// Construct resolved source from an existing local directory.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            working_copy: None,
        }
    }

    /// Construct resolved source backed by a temporary working copy.
    pub fn cloned(working_copy: TempDir) -> Self {
        Self {
            path: working_copy.path().to_path_buf(),
            working_copy: Some(working_copy),
        }
    }

    /// Path to the source tree.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Check if source is a temporary working copy.
    pub fn is_cloned(&self) -> bool {
        self.working_copy.is_some()
    }

    /// Keep temporary working copy around after this value is dropped.
    ///
    /// Returns path to the source tree, which is now the caller's
    /// responsibility to remove.
    pub fn keep(self) -> PathBuf {
        if let Some(working_copy) = self.working_copy {
            return working_copy.keep();
        }

        self.path
    }
}

/// Turn a [`SourceSpec`] into a local directory.
pub trait Resolve {
    /// Resolve source specifier into local directory.
    fn resolve(&self, spec: &SourceSpec) -> Result<ResolvedSource>;
}

/// Options that select and configure a resolver.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Branch, tag, or commit to check out.
    pub reference: Option<String>,

    /// Pull local source before use.
    pub pull: bool,
}

/// Select resolver for given source specifier.
///
/// Remote sources, and local sources that need a specific reference checked
/// out, get cloned. Other local sources are used in place.
pub fn resolver_for(spec: &SourceSpec, options: &ResolveOptions) -> Box<dyn Resolve> {
    if spec.is_remote() || options.reference.is_some() {
        if options.pull {
            warn!("ignore pull request for cloned source {spec}");
        }

        return Box::new(CloneResolver::new(options.reference.clone()));
    }

    Box::new(LocalResolver::new(options.pull))
}

/// Use local directory in place.
#[derive(Debug, Default, Clone)]
pub struct LocalResolver {
    pull: bool,
}

impl LocalResolver {
    /// Construct new local resolver.
    ///
    /// If `pull` is set, then `git pull` is run inside the directory before
    /// it is handed out.
    pub fn new(pull: bool) -> Self {
        Self { pull }
    }
}

impl Resolve for LocalResolver {
    /// Resolve local directory.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError::SourceNotFound`] if path does not exist.
    /// - Return [`SourceError::NotADirectory`] if path is not a directory.
    /// - Return [`SourceError::Unreadable`] if directory cannot be read.
    /// - Return [`SourceError::PullFailed`] if pull was requested and failed.
    /// - Return [`SourceError::CloneFailed`] if handed a remote specifier.
    #[instrument(skip(self), level = "debug")]
    fn resolve(&self, spec: &SourceSpec) -> Result<ResolvedSource> {
        let path = match spec {
            SourceSpec::Local(path) => path,
            SourceSpec::Remote(url) => {
                return Err(SourceError::CloneFailed {
                    url: url.clone(),
                    source: git2::Error::from_str("remote source needs to be cloned"),
                })
            }
        };

        check_local_dir(path)?;

        if self.pull {
            info!("pull {:?}", path.display());
            let args = [OsStr::new("-C"), path.as_os_str(), OsStr::new("pull")];
            let output =
                syscall_non_interactive("git", args).map_err(|err| SourceError::PullFailed {
                    source: err,
                    path: path.clone(),
                })?;
            debug!("{output}");
        }

        Ok(ResolvedSource::local(path))
    }
}

fn check_local_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(SourceError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    if !path.is_dir() {
        return Err(SourceError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    read_dir(path).map_err(|err| SourceError::Unreadable {
        source: err,
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Clone source into a temporary working copy through libgit2.
#[derive(Debug, Clone)]
pub struct CloneResolver {
    reference: Option<String>,
    bar: ProgressBar,
}

impl CloneResolver {
    /// Construct new clone resolver.
    ///
    /// If `reference` is given, then it is checked out once cloning is done.
    pub fn new(reference: Option<String>) -> Self {
        Self {
            reference,
            bar: ProgressBar::new(0),
        }
    }

    /// Report clone progress through given progress bar.
    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.bar = bar;
        self
    }

    /// Clone `url` into `path`.
    ///
    /// If any credentials are required for the clone to continue, then the
    /// user will be prompted for that information accordingly. The progress
    /// bar will be blocked for user input.
    fn clone_into(&self, url: &str, path: &Path) -> Result<Repository> {
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        self.bar.set_style(style);
        self.bar.set_message(url.to_string());
        self.bar.enable_steady_tick(time::Duration::from_millis(100));

        let prompter = IndicatifPrompter::new(self.bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
        let config = Config::open_default()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            let stats = progress.to_owned();
            let bar_size = stats.total_objects() as u64;
            let bar_pos = stats.received_objects() as u64;
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                prompter.bar.set_length(bar_size);
                prompter.bar.set_position(bar_pos);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        let result = RepoBuilder::new().fetch_options(fo).clone(url, path);
        self.bar.finish_and_clear();

        result.map_err(|err| SourceError::CloneFailed {
            url: url.to_string(),
            source: err,
        })
    }
}

impl Resolve for CloneResolver {
    /// Clone source into fresh temporary directory.
    ///
    /// # Errors
    ///
    /// - Return [`SourceError::SourceNotFound`] if local path does not exist.
    /// - Return [`SourceError::TempDir`] if temporary directory cannot be made.
    /// - Return [`SourceError::CloneFailed`] if cloning fails.
    /// - Return [`SourceError::CheckoutFailed`] if reference cannot be
    ///   checked out.
    #[instrument(skip(self), level = "debug")]
    fn resolve(&self, spec: &SourceSpec) -> Result<ResolvedSource> {
        let url = match spec {
            SourceSpec::Local(path) => {
                check_local_dir(path)?;
                path.to_string_lossy().into_owned()
            }
            SourceSpec::Remote(url) => url.clone(),
        };

        let working_copy = tempfile::Builder::new()
            .prefix("putconf-")
            .suffix("__putconf-source")
            .tempdir()
            .map_err(SourceError::TempDir)?;

        info!("clone {url} into {:?}", working_copy.path().display());
        let repository = self.clone_into(&url, working_copy.path())?;

        if let Some(reference) = &self.reference {
            checkout(&repository, reference)?;
        }

        Ok(ResolvedSource::cloned(working_copy))
    }
}

#[instrument(skip(repository), level = "debug")]
fn checkout(repository: &Repository, reference: &str) -> Result<()> {
    let checkout_failed = |err: git2::Error| SourceError::CheckoutFailed {
        reference: reference.to_string(),
        source: err,
    };

    let object = find_reference(repository, reference).map_err(checkout_failed)?;
    let commit = object.peel_to_commit().map_err(checkout_failed)?;

    info!("check out {reference} at {}", commit.id());
    repository
        .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
        .map_err(checkout_failed)?;
    repository
        .set_head_detached(commit.id())
        .map_err(checkout_failed)?;

    Ok(())
}

// INVARIANT: Fresh clones only have a local branch for the remote's HEAD.
fn find_reference<'repo>(
    repository: &'repo Repository,
    reference: &str,
) -> std::result::Result<Object<'repo>, git2::Error> {
    repository
        .revparse_single(reference)
        .or_else(|err| {
            repository
                .revparse_single(&format!("origin/{reference}"))
                .map_err(|_| err)
        })
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> std::io::Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        )));
    }

    Ok(message)
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Source resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Local source path does not exist.
    #[error("source path {:?} does not exist", path.display())]
    SourceNotFound { path: PathBuf },

    /// Local source path is not a directory.
    #[error("source path {:?} does not name a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Local source directory cannot be read.
    #[error("source path {:?} is not readable", path.display())]
    Unreadable {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Source specifier uses a transport that cannot be fetched from.
    #[error("unsupported transport {scheme:?}")]
    UnsupportedTransport { scheme: String },

    /// Temporary directory for a working copy cannot be created.
    #[error("failed to create temporary directory for source")]
    TempDir(#[source] std::io::Error),

    /// Cloning of the source failed.
    #[error("failed to clone {url}")]
    CloneFailed {
        #[source]
        source: git2::Error,
        url: String,
    },

    /// Requested reference cannot be checked out.
    #[error("failed to check out {reference:?}")]
    CheckoutFailed {
        #[source]
        source: git2::Error,
        reference: String,
    },

    /// Pulling a local source failed.
    #[error("failed to pull {:?}", path.display())]
    PullFailed {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = SourceError> = std::result::Result<T, E>;
