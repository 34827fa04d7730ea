// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::TreeFixture;

use anyhow::Result;
use pretty_assertions::assert_eq;
use putconf::{
    reconcile::{Outcome, ReconcileError},
    scan::ScanError,
    ConflictPolicy, Direction, FileEntry, OverwriteMode, Reconciler, SyncScope,
};
use std::{fs, path::PathBuf};

fn no_names() -> Vec<PathBuf> {
    Vec::new()
}

fn target_names(entries: &[FileEntry]) -> Vec<PathBuf> {
    entries
        .iter()
        .map(|entry| entry.target_name.clone())
        .collect()
}

#[test]
fn install_maps_dotfiles_directory_into_target() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".dotfiles/bashrc", "alias ll='ls -l'\n")?;
    fixture.write_source(".dotfiles/config/nvim/init.lua", "vim.o.number = true\n")?;
    fixture.write_source("README.md", "# My dotfiles\n")?;
    fixture.write_source("bin/tool", "#!/bin/sh\n")?;
    fixture.write_source(".gitignore", "*.swp\n")?;
    fixture.write_source(".git/config", "[core]\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Install, no_names())?;
    assert_eq!(
        target_names(plan.entries()),
        vec![
            PathBuf::from(".bashrc"),
            PathBuf::from(".config/nvim/init.lua"),
            PathBuf::from("README.md"),
            PathBuf::from("bin/tool"),
        ]
    );

    let report = reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;
    assert!(report.is_success());
    assert_eq!(report.count(Outcome::Created), 4);

    assert_eq!(
        fs::read(fixture.target().join(".bashrc"))?,
        fs::read(fixture.source().join(".dotfiles/bashrc"))?
    );
    assert_eq!(
        fs::read_to_string(fixture.target().join(".config/nvim/init.lua"))?,
        "vim.o.number = true\n"
    );
    assert!(fixture.target().join("README.md").is_file());
    assert!(!fixture.target().join(".gitignore").exists());
    assert!(!fixture.target().join(".git").exists());
    assert!(!fixture.target().join(".dotfiles").exists());

    Ok(())
}

#[test]
fn install_missing_explicit_name_copies_nothing() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".dotfiles/bashrc", "alias ll='ls -l'\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let result = reconciler.plan(Direction::Install, [".dotfiles/bashrc", "missing"]);
    assert!(matches!(
        result,
        Err(ReconcileError::EntryNotFound { name, .. }) if name == PathBuf::from("missing")
    ));
    assert_eq!(fs::read_dir(fixture.target())?.count(), 0);

    Ok(())
}

#[test]
fn install_rejects_names_outside_source() -> Result<()> {
    let fixture = TreeFixture::new()?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let result = reconciler.plan(Direction::Install, ["../escape"]);
    assert!(matches!(result, Err(ReconcileError::InvalidName { .. })));

    Ok(())
}

#[test]
fn install_explicit_directory_expands_to_files() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".dotfiles/config/git/config", "[user]\n")?;
    fixture.write_source(".dotfiles/config/git/ignore", "target/\n")?;
    fixture.write_source(".dotfiles/bashrc", "alias ll='ls -l'\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Install, [".dotfiles/config"])?;
    assert_eq!(
        target_names(plan.entries()),
        vec![
            PathBuf::from(".config/git/config"),
            PathBuf::from(".config/git/ignore"),
        ]
    );

    Ok(())
}

#[test]
fn install_prefers_dotfiles_directory_on_collision() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".bashrc", "literal\n")?;
    fixture.write_source(".dotfiles/bashrc", "stored\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Install, [".bashrc", ".dotfiles/bashrc"])?;
    assert_eq!(plan.entries(), [FileEntry::from_source_name(".dotfiles/bashrc")]);
    assert_eq!(plan.ambiguous(), [FileEntry::from_source_name(".bashrc")]);

    reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;
    assert_eq!(fs::read_to_string(fixture.target().join(".bashrc"))?, "stored\n");

    Ok(())
}

#[test]
fn install_never_overwrite_leaves_existing_files() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".dotfiles/bashrc", "theirs\n")?;
    fixture.write_source(".dotfiles/vimrc", "set nu\n")?;
    fixture.write_target(".bashrc", "mine\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Install, no_names())?;
    let report = reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Never))?;

    assert_eq!(report.count(Outcome::Skipped), 1);
    assert_eq!(report.count(Outcome::Created), 1);
    assert_eq!(fs::read_to_string(fixture.target().join(".bashrc"))?, "mine\n");
    assert_eq!(fs::read_to_string(fixture.target().join(".vimrc"))?, "set nu\n");

    Ok(())
}

#[test]
fn install_always_overwrite_replaces_existing_files() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".dotfiles/bashrc", "theirs\n")?;
    fixture.write_target(".bashrc", "mine\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Install, no_names())?;
    let report = reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;

    assert_eq!(report.count(Outcome::Overwritten), 1);
    assert_eq!(fs::read_to_string(fixture.target().join(".bashrc"))?, "theirs\n");

    Ok(())
}

#[test]
fn install_stops_at_first_failed_copy() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".x", "plain file\n")?;
    fixture.write_source(".dotfiles/x/y", "needs .x to be a directory\n")?;
    fixture.write_source("z", "never reached\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Install, [".x", ".dotfiles/x/y", "z"])?;
    assert_eq!(plan.len(), 3);

    let report = reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;
    assert!(!report.is_success());
    assert_eq!(report.outcomes().len(), 1);
    assert_eq!(report.outcomes()[0].entry.target_name, PathBuf::from(".x"));

    let failure = report.failure().map(|failure| failure.entry.target_name.clone());
    assert_eq!(failure, Some(PathBuf::from(".x/y")));
    assert!(fixture.target().join(".x").is_file());
    assert!(!fixture.target().join("z").exists());

    match report.into_result() {
        Err(ReconcileError::Aborted { completed, source, .. }) => {
            assert_eq!(completed, 1);
            assert!(matches!(*source, ReconcileError::CopyIo { .. }));
        }
        other => panic!("expected aborted report, got {other:?}"),
    }

    Ok(())
}

#[test]
fn sync_updates_dotfiles_counterpart() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".dotfiles/bashrc", "old\n")?;
    fixture.write_target(".bashrc", "new\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Sync, [".bashrc"])?;
    let report = reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Never))?;

    assert_eq!(report.count(Outcome::Overwritten), 1);
    assert_eq!(
        fs::read_to_string(fixture.source().join(".dotfiles/bashrc"))?,
        "new\n"
    );
    assert!(!fixture.source().join(".bashrc").exists());

    Ok(())
}

#[test]
fn sync_full_scan_stores_new_dotfiles() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_target(".vimrc", "set nu\n")?;
    fixture.write_target("notes.txt", "remember the milk\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Sync, no_names())?;
    let report = reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;

    assert_eq!(report.count(Outcome::Created), 2);
    assert_eq!(
        fs::read_to_string(fixture.source().join(".dotfiles/vimrc"))?,
        "set nu\n"
    );
    assert!(fixture.source().join("notes.txt").is_file());
    assert!(!fixture.source().join(".vimrc").exists());

    Ok(())
}

#[test]
fn sync_tracked_scope_only_touches_known_files() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".dotfiles/bashrc", "old\n")?;
    fixture.write_source(".dotfiles/zshrc", "untouched\n")?;
    fixture.write_target(".bashrc", "new\n")?;
    fixture.write_target(".profile", "untracked\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target()).sync_scope(SyncScope::Tracked);
    let plan = reconciler.plan(Direction::Sync, no_names())?;
    assert_eq!(plan.entries(), [FileEntry::from_source_name(".dotfiles/bashrc")]);

    reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;
    assert_eq!(
        fs::read_to_string(fixture.source().join(".dotfiles/bashrc"))?,
        "new\n"
    );
    assert_eq!(
        fs::read_to_string(fixture.source().join(".dotfiles/zshrc"))?,
        "untouched\n"
    );
    assert!(!fixture.source().join(".dotfiles/profile").exists());

    Ok(())
}

#[test]
fn sync_flags_ambiguous_literal_dotfile() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".bashrc", "literal\n")?;
    fixture.write_source(".dotfiles/bashrc", "stored\n")?;
    fixture.write_target(".bashrc", "new\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Sync, [".bashrc"])?;
    assert_eq!(plan.ambiguous(), [FileEntry::new(".dotfiles/bashrc", ".bashrc")]);

    reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;
    assert_eq!(fs::read_to_string(fixture.source().join(".bashrc"))?, "literal\n");
    assert_eq!(
        fs::read_to_string(fixture.source().join(".dotfiles/bashrc"))?,
        "new\n"
    );

    Ok(())
}

#[test]
fn sync_full_scan_skips_nested_source() -> Result<()> {
    let target = tempfile::tempdir()?;
    let source = target.path().join("dotfiles");
    fs::create_dir_all(source.join(".dotfiles"))?;
    fs::write(source.join(".dotfiles/bashrc"), "old\n")?;
    fs::write(target.path().join(".bashrc"), "new\n")?;

    let reconciler = Reconciler::new(&source, target.path());
    let plan = reconciler.plan(Direction::Sync, no_names())?;
    assert_eq!(plan.entries(), [FileEntry::new(".dotfiles/bashrc", ".bashrc")]);

    Ok(())
}

#[test]
fn sync_missing_explicit_name_copies_nothing() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_target(".bashrc", "new\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let result = reconciler.plan(Direction::Sync, [".bashrc", ".vimrc"]);
    assert!(matches!(
        result,
        Err(ReconcileError::EntryNotFound { name, .. }) if name == PathBuf::from(".vimrc")
    ));
    assert_eq!(fs::read_dir(fixture.source())?.count(), 0);

    Ok(())
}

#[test]
fn sync_rejects_names_outside_target() -> Result<()> {
    let fixture = TreeFixture::new()?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let result = reconciler.plan(Direction::Sync, ["../.bashrc"]);
    assert!(matches!(result, Err(ReconcileError::InvalidName { .. })));

    let result = reconciler.plan(Direction::Sync, [fixture.target().join(".bashrc")]);
    assert!(matches!(result, Err(ReconcileError::InvalidName { .. })));

    Ok(())
}

#[cfg(unix)]
#[test]
fn sync_full_scan_skips_source_behind_symlink() -> Result<()> {
    let fixture = TreeFixture::new()?;
    fixture.write_source(".dotfiles/bashrc", "old\n")?;
    fixture.write_target(".bashrc", "new\n")?;
    std::os::unix::fs::symlink(fixture.source(), fixture.target().join("dots"))?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Sync, no_names())?;
    assert_eq!(plan.entries(), [FileEntry::new(".dotfiles/bashrc", ".bashrc")]);

    Ok(())
}

#[cfg(unix)]
#[test]
fn sync_skips_target_linked_to_its_origin() -> Result<()> {
    let fixture = TreeFixture::new()?;
    let stored = fixture.write_source(".dotfiles/bashrc", "precious\n")?;
    std::os::unix::fs::symlink(&stored, fixture.target().join(".bashrc"))?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Sync, [".bashrc"])?;
    let report = reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;

    assert!(report.is_success());
    assert_eq!(report.count(Outcome::Skipped), 1);
    assert_eq!(fs::read_to_string(&stored)?, "precious\n");

    Ok(())
}

#[cfg(unix)]
#[test]
fn install_skips_target_linked_to_its_origin() -> Result<()> {
    let fixture = TreeFixture::new()?;
    let stored = fixture.write_source(".dotfiles/vimrc", "set nu\n")?;
    std::os::unix::fs::symlink(&stored, fixture.target().join(".vimrc"))?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Install, no_names())?;
    let report = reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;

    assert!(report.is_success());
    assert_eq!(report.count(Outcome::Skipped), 1);
    assert_eq!(fs::read_to_string(&stored)?, "set nu\n");

    Ok(())
}

#[cfg(unix)]
#[test]
fn unwritable_target_aborts_before_copying() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if crate::is_root() {
        return Ok(());
    }

    let fixture = TreeFixture::new()?;
    fixture.write_source("README.md", "# My dotfiles\n")?;
    fixture.write_source(".dotfiles/bashrc", "alias ll='ls -l'\n")?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Install, no_names())?;

    fs::set_permissions(fixture.target(), fs::Permissions::from_mode(0o555))?;
    let result = reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always));

    // INVARIANT: Restore access so the fixture can be cleaned up.
    fs::set_permissions(fixture.target(), fs::Permissions::from_mode(0o755))?;

    assert!(matches!(
        result,
        Err(ReconcileError::ParentNotWritable { path, .. }) if path == fixture.target()
    ));
    assert_eq!(fs::read_dir(fixture.target())?.count(), 0);

    Ok(())
}

#[cfg(unix)]
#[test]
fn exec_bit_survives_install_and_sync() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let fixture = TreeFixture::new()?;
    let script = fixture.write_source("bin/tool", "#!/bin/sh\necho hi\n")?;
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let plan = reconciler.plan(Direction::Install, ["bin/tool"])?;
    reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;
    let installed = fixture.target().join("bin/tool");
    assert_eq!(fs::metadata(&installed)?.permissions().mode() & 0o111, 0o111);

    fs::remove_file(&script)?;
    let plan = reconciler.plan(Direction::Sync, ["bin/tool"])?;
    reconciler.execute(&plan, &mut ConflictPolicy::new(OverwriteMode::Always))?;
    assert_eq!(fs::metadata(&script)?.permissions().mode() & 0o111, 0o111);

    Ok(())
}

#[cfg(unix)]
#[test]
fn unreadable_directory_aborts_planning() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if crate::is_root() {
        return Ok(());
    }

    let fixture = TreeFixture::new()?;
    fixture.write_source("bin/tool", "#!/bin/sh\n")?;
    fixture.write_source("locked/secret", "hidden\n")?;
    let locked = fixture.source().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;

    let reconciler = Reconciler::new(fixture.source(), fixture.target());
    let result = reconciler.plan(Direction::Install, no_names());

    // INVARIANT: Restore access so the fixture can be cleaned up.
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;

    assert!(matches!(
        result,
        Err(ReconcileError::Scan(ScanError::Permission { path, .. })) if path.ends_with("locked")
    ));
    assert_eq!(fs::read_dir(fixture.target())?.count(), 0);

    Ok(())
}
