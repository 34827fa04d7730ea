// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use putconf::{
    config::Config,
    path::{default_config_file, home_dir},
    resolver_for, ConflictPolicy, Direction, OverwriteMode, Reconciler, ResolveOptions,
    SourceSpec, SyncScope,
};

use anyhow::{bail, Result};
use clap::Parser;
use std::{
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install/sync user configuration files from a folder or git repository.
///
/// Files and directories in the top-level of SOURCE are ignored if their
/// names begin with dots. However, if SOURCE contains a directory named
/// ".dotfiles", then the files and directories within are treated as if they
/// reside directly in SOURCE, but will have dots prepended to their names in
/// TARGET.
#[derive(Debug, Clone, Parser)]
#[command(override_usage = "putconf [options] <source> [<files>]...", version)]
struct Cli {
    /// Where config files are stored (path or URL).
    #[arg(value_name = "source")]
    pub source: String,

    /// Which config files to act on (default all).
    ///
    /// Names are relative to SOURCE when installing, and relative to TARGET
    /// when synchronizing. Absolute paths inside of the respective tree are
    /// accepted as well.
    #[arg(value_name = "files")]
    pub files: Vec<PathBuf>,

    /// Where config files go (defaults to $HOME).
    #[arg(short, long, value_name = "path")]
    pub target: Option<PathBuf>,

    /// Print extra information.
    #[arg(short, long)]
    pub verbose: bool,

    /// Branch, commit, or tag to check out from source.
    #[arg(long, value_name = "ref")]
    pub checkout: Option<String>,

    /// Run `git pull` on a local SOURCE before install/sync.
    #[arg(long)]
    pub pull: bool,

    /// Do not actually install/sync files (implies --verbose).
    #[arg(long)]
    pub dry_run: bool,

    /// Overwrite existing files without prompting.
    #[arg(short = 'w', long, group = "overwrite_mode")]
    pub overwrite: bool,

    /// Never overwrite existing files.
    #[arg(short = 'n', long, group = "overwrite_mode")]
    pub no_overwrite: bool,

    /// Ask before overwriting each existing file.
    #[arg(short = 'p', long, group = "overwrite_mode")]
    pub prompt: bool,

    /// Update SOURCE with config files from TARGET.
    #[arg(short = 'S', long, conflicts_with_all = ["overwrite", "no_overwrite", "prompt"])]
    pub sync_source: bool,

    /// Only sync files that SOURCE already has.
    #[arg(long, requires = "sync_source")]
    pub tracked: bool,
}

impl Cli {
    fn overwrite_mode(&self, config: &Config) -> OverwriteMode {
        if self.overwrite {
            OverwriteMode::Always
        } else if self.no_overwrite {
            OverwriteMode::Never
        } else if self.prompt {
            OverwriteMode::Prompt
        } else {
            config.settings.overwrite
        }
    }

    fn sync_scope(&self, config: &Config) -> SyncScope {
        if self.tracked {
            SyncScope::Tracked
        } else {
            config.settings.sync_scope
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose || cli.dry_run { "debug" } else { "info" };
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run(cli) {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(default_config_file()?)?;

    if cli.dry_run {
        info!("dry run: no changes will be made to destination");
    }

    let spec: SourceSpec = cli.source.parse()?;
    let direction = if cli.sync_source {
        Direction::Sync
    } else {
        Direction::Install
    };

    check_sync_source(direction, &spec, cli.checkout.as_deref())?;

    let target = match cli.target.clone().or(config.settings.target.clone()) {
        Some(target) => target,
        None => home_dir()?,
    };

    let options = ResolveOptions {
        reference: cli.checkout.clone(),
        pull: cli.pull || config.settings.pull,
    };
    let source = resolver_for(&spec, &options).resolve(&spec)?;

    let root = match direction {
        Direction::Install => source.path(),
        Direction::Sync => target.as_path(),
    };
    let files = cli
        .files
        .iter()
        .map(|file| relative_to(file, root))
        .collect::<Result<Vec<_>>>()?;

    let reconciler = Reconciler::new(source.path(), &target)
        .sync_scope(cli.sync_scope(&config))
        .dry_run(cli.dry_run);
    let plan = reconciler.plan(direction, &files)?;

    let mut policy = ConflictPolicy::new(cli.overwrite_mode(&config));
    let report = reconciler.execute(&plan, &mut policy)?;
    info!("{report}");
    report.into_result()?;

    Ok(())
}

// INVARIANT: Synced files must land somewhere the user can commit them from.
fn check_sync_source(
    direction: Direction,
    spec: &SourceSpec,
    checkout: Option<&str>,
) -> Result<()> {
    if direction != Direction::Sync {
        return Ok(());
    }

    if spec.is_remote() {
        bail!("synchronization is only supported for local sources");
    }

    if let Some(reference) = checkout {
        bail!("synchronization cannot target {reference:?}, check it out in {spec} first");
    }

    Ok(())
}

fn relative_to(file: &Path, root: &Path) -> Result<PathBuf> {
    if file.is_relative() {
        return Ok(file.to_path_buf());
    }

    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let file = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
    match file.strip_prefix(&root) {
        Ok(relative) => Ok(relative.to_path_buf()),
        Err(_) => bail!("{:?} is not within {:?}", file.display(), root.display()),
    }
}
