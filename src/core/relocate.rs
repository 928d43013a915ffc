// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    env,
    ffi::OsString,
    io,
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::{Context, Result};

use crate::{
    conf::config::Layout,
    core::{confirm::Confirm, descriptor::LauncherEntry},
    defs,
    mount::inspect,
    utils,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Not running as an artifact, already at the stable location, or the
    /// current location can execute.
    NotApplicable,
    Declined,
    /// Relocation or relaunch failed; the current process carries on.
    Failed(String),
    /// A copy was started from here. The caller should exit.
    Relaunched(PathBuf),
}

/// Path of the running artifact, if the runtime announced one that exists.
pub fn running_artifact() -> Option<PathBuf> {
    let path = PathBuf::from(env::var_os(defs::ARTIFACT_ENV)?);
    path.is_file().then_some(path)
}

/// Copies `source` to the stable self location and marks it executable.
pub fn relocate(source: &Path, layout: &Layout) -> Result<PathBuf> {
    let dest = layout.self_artifact_path();
    if let Some(parent) = dest.parent() {
        utils::ensure_dir_exists(parent)?;
    }

    if utils::is_same_file(source, &dest) {
        log::debug!("{} already at stable location", source.display());
    } else {
        let len = utils::install_file(source, &dest)?;
        log::info!("Copied {} to {} ({} bytes)", source.display(), dest.display(), len);
    }
    utils::set_executable(&dest)?;
    Ok(dest)
}

/// Starts `dest` detached in its own session. Standard output and error stay
/// attached to ours so the new instance can still report.
pub fn relaunch(dest: &Path, args: &[OsString]) -> Result<()> {
    let mut command = Command::new(dest);
    command
        .args(args)
        .env(defs::ARTIFACT_ENV, dest)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    // SAFETY: setsid is async-signal-safe and touches no parent state.
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid().map_err(io::Error::from)?;
            Ok(())
        });
    }

    let child = command
        .spawn()
        .with_context(|| format!("Failed to launch {}", dest.display()))?;
    tracing::info!("Relaunched from {} (pid {})", dest.display(), child.id());
    Ok(())
}

fn should_offer(running: &Path, layout: &Layout, non_executable: &dyn Fn(&Path) -> bool) -> bool {
    if utils::is_same_file(running, &layout.self_artifact_path()) {
        log::debug!("Running from stable location {}", running.display());
        return false;
    }
    non_executable(running)
}

fn relocate_and_relaunch(running: &Path, layout: &Layout, args: &[OsString]) -> BootstrapOutcome {
    let dest = match relocate(running, layout) {
        Ok(dest) => dest,
        Err(e) => {
            log::warn!("Relocation failed: {:#}", e);
            return BootstrapOutcome::Failed(format!("{e:#}"));
        }
    };
    match relaunch(&dest, args) {
        Ok(()) => BootstrapOutcome::Relaunched(dest),
        Err(e) => {
            log::warn!("Relaunch failed: {:#}", e);
            BootstrapOutcome::Failed(format!("{e:#}"))
        }
    }
}

/// Offers to move a running artifact off a mount that cannot execute
/// programs, then restarts from the copy with the same arguments.
pub fn bootstrap_check_and_offer(
    running: Option<&Path>,
    layout: &Layout,
    confirm: &mut dyn Confirm,
) -> BootstrapOutcome {
    let args: Vec<OsString> = env::args_os().skip(1).collect();
    offer(running, layout, confirm, &inspect::is_non_executable, &args)
}

fn offer(
    running: Option<&Path>,
    layout: &Layout,
    confirm: &mut dyn Confirm,
    non_executable: &dyn Fn(&Path) -> bool,
    args: &[OsString],
) -> BootstrapOutcome {
    let Some(running) = running else {
        return BootstrapOutcome::NotApplicable;
    };
    if !should_offer(running, layout, non_executable) {
        return BootstrapOutcome::NotApplicable;
    }

    let question = format!(
        "{} is on a filesystem that does not allow running programs. Copy it to {} and restart from there?",
        running.display(),
        layout.self_artifact_path().display()
    );
    if !confirm.confirm(&question) {
        log::info!("Relocation declined, continuing from {}", running.display());
        return BootstrapOutcome::Declined;
    }

    relocate_and_relaunch(running, layout, args)
}

/// Writes a launcher for this tool itself. It carries its own tag and is
/// not an install record.
pub fn install_self_launcher(layout: &Layout, target: &Path, refresh_cache: bool) -> Result<PathBuf> {
    let mut entry = LauncherEntry {
        name: defs::APP_NAME.to_string(),
        comment: "Install portable applications".to_string(),
        exec_path: target.to_path_buf(),
        icon: None,
        categories: "Utility;System;".to_string(),
        extra: Vec::new(),
    };
    entry
        .extra
        .push((defs::SELF_TAG.to_string(), "true".to_string()));

    let path = layout.self_descriptor_path();
    utils::ensure_dir_exists(&layout.launcher_dir)?;
    utils::atomic_write(&path, entry.render())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Self launcher written: {}", path.display());
    if refresh_cache {
        utils::refresh_launcher_cache(&layout.launcher_dir);
    }
    Ok(path)
}
