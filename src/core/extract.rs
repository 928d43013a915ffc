// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs, io,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    thread,
    time::Duration,
};

use rustix::io::Errno;
use serde::Serialize;
use tempfile::TempDir;
use wait_timeout::ChildExt;

use crate::{
    core::{descriptor::DesktopEntry, icon},
    defs, utils,
};

const SPAWN_ATTEMPTS: u32 = 5;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(50);

/// What an artifact says about itself. `icon_path` points into the
/// extraction tree and is only valid while the owning [`Extraction`] lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedMetadata {
    pub suggested_name: Option<String>,
    pub icon_path: Option<PathBuf>,
    pub icon_hint: Option<String>,
}

/// Unpacked artifact contents. The scratch directory is deleted on drop.
#[derive(Debug)]
pub struct Extraction {
    _scratch: TempDir,
    root: PathBuf,
}

impl Extraction {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Launcher file shipped inside the artifact: top level first, then the
    /// standard applications directory.
    pub fn embedded_descriptor(&self) -> Option<PathBuf> {
        [self.root.clone(), self.root.join(defs::EMBEDDED_DESKTOP_DIR)]
            .iter()
            .find_map(|dir| first_desktop_file(dir))
    }

    pub fn metadata(&self) -> ExtractedMetadata {
        let entry = self
            .embedded_descriptor()
            .and_then(|path| match DesktopEntry::parse_file(&path) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Unreadable embedded descriptor {}: {:#}", path.display(), e);
                    None
                }
            });

        let lang = current_language();
        let suggested_name = entry
            .as_ref()
            .and_then(|e| e.display_name(lang.as_deref()))
            .map(str::to_string);
        let icon_hint = entry
            .as_ref()
            .and_then(|e| e.get("Icon"))
            .map(str::to_string);
        let icon_path = icon::find_icon(&self.root, icon_hint.as_deref());

        ExtractedMetadata {
            suggested_name,
            icon_path,
            icon_hint,
        }
    }
}

fn first_desktop_file(dir: &Path) -> Option<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(defs::DESKTOP_EXTENSION))
        })
        .collect();
    found.sort();
    found.into_iter().next()
}

// "fr_FR.UTF-8" -> "fr"
fn current_language() -> Option<String> {
    let lang = std::env::var("LANG").ok()?;
    let code = lang.split(['_', '.', '@']).next()?.trim();
    (!code.is_empty() && code != "C" && code != "POSIX").then(|| code.to_string())
}

/// Runs the artifact's self-extraction in a fresh scratch directory. Every
/// failure (spawn error, non-zero exit, timeout, missing output) gives `None`.
pub fn extract(artifact: &Path, timeout: Duration) -> Option<Extraction> {
    if let Err(e) = utils::set_executable(artifact) {
        tracing::debug!("Could not mark {} executable: {:#}", artifact.display(), e);
    }

    let scratch = match tempfile::Builder::new()
        .prefix(defs::EXTRACT_DIR_PREFIX)
        .tempdir()
    {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!("Failed to create extraction directory: {}", e);
            return None;
        }
    };

    let mut child = match spawn_extractor(artifact, scratch.path()) {
        Ok(child) => child,
        Err(e) => {
            tracing::info!("Cannot run {} for extraction: {}", artifact.display(), e);
            return None;
        }
    };

    match child.wait_timeout(timeout) {
        Ok(Some(status)) if status.success() => {}
        Ok(Some(status)) => {
            tracing::info!("Extraction of {} failed: {}", artifact.display(), status);
            return None;
        }
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(
                "Extraction of {} timed out after {}s",
                artifact.display(),
                timeout.as_secs()
            );
            return None;
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!("Failed waiting for extraction of {}: {}", artifact.display(), e);
            return None;
        }
    }

    let root = scratch.path().join(defs::EXTRACT_ROOT_NAME);
    if !root.is_dir() {
        tracing::info!(
            "{} exited cleanly but produced no {}",
            artifact.display(),
            defs::EXTRACT_ROOT_NAME
        );
        return None;
    }

    tracing::debug!("Extracted {} into {}", artifact.display(), root.display());
    Some(Extraction {
        _scratch: scratch,
        root,
    })
}

// A freshly written file can still be held open for writing by a forked
// child elsewhere in the process, so ETXTBSY is retried briefly.
fn spawn_extractor(artifact: &Path, cwd: &Path) -> io::Result<Child> {
    let mut attempt = 1;
    loop {
        let result = Command::new(artifact)
            .arg(defs::EXTRACT_FLAG)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match result {
            Err(e)
                if e.raw_os_error() == Some(Errno::TXTBSY.raw_os_error())
                    && attempt < SPAWN_ATTEMPTS =>
            {
                attempt += 1;
                thread::sleep(SPAWN_RETRY_DELAY);
            }
            other => return other,
        }
    }
}

/// Extracts and reads metadata in one go. The icon path is reported relative
/// to the extraction root since the tree is gone once this returns.
pub fn inspect(artifact: &Path, timeout: Duration) -> Option<ExtractedMetadata> {
    let extraction = extract(artifact, timeout)?;
    let mut metadata = extraction.metadata();
    metadata.icon_path = metadata
        .icon_path
        .as_deref()
        .and_then(|p| p.strip_prefix(extraction.root()).ok())
        .map(Path::to_path_buf);
    Some(metadata)
}
