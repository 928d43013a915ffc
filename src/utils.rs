// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs::{self, File, OpenOptions, create_dir_all},
    io::{Read, Write},
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use rustix::fs::{Mode, chmod, ioctl_ficlone};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

use crate::defs;

/// Installs the global subscriber. The returned guard must stay alive for the
/// file writer to flush.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            ensure_dir_exists(dir)?;
            let name = path
                .file_name()
                .context("Log file path has no file name")?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    tracing_log::LogTracer::init().context("Failed to bridge log records into tracing")?;

    Ok(guard)
}

fn temp_sibling(path: &Path) -> Result<PathBuf> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_name = format!(
        ".appshelf_tmp_{}_{}.tmp",
        std::process::id(),
        SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos()
    );
    Ok(dir.join(temp_name))
}

// Removes the temporary file unless the guard is forgotten after a successful rename.
struct CleanupGuard<'a>(&'a Path);

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.0);
    }
}

/// Writes through a temporary sibling and renames it over `path`, so readers
/// only ever see the old or the new content.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, content: C) -> Result<()> {
    let path = path.as_ref();
    let temp_file = temp_sibling(path)?;
    let guard = CleanupGuard(&temp_file);

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_file)
            .context("Failed to create temporary file for atomic write")?;
        file.write_all(content.as_ref())?;
        file.sync_all()?;
    }

    fs::rename(&temp_file, path)
        .with_context(|| format!("Failed to move temporary file into {}", path.display()))?;
    std::mem::forget(guard);
    Ok(())
}

/// Copies `src` over `dest` through a temporary sibling. A failed copy never
/// leaves a truncated file at `dest`, and a running binary at `dest` is
/// replaced instead of rewritten in place.
pub fn install_file(src: &Path, dest: &Path) -> Result<u64> {
    let temp_file = temp_sibling(dest)?;
    let guard = CleanupGuard(&temp_file);

    let len = reflink_or_copy(src, &temp_file)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
    fs::rename(&temp_file, dest)
        .with_context(|| format!("Failed to move copy into {}", dest.display()))?;
    std::mem::forget(guard);
    Ok(len)
}

pub fn reflink_or_copy(src: &Path, dest: &Path) -> Result<u64> {
    let src_file = File::open(src)?;
    let dest_file = File::create(dest)?;

    if ioctl_ficlone(&dest_file, &src_file).is_ok() {
        let metadata = src_file.metadata()?;
        let len = metadata.len();
        dest_file.set_permissions(metadata.permissions())?;
        return Ok(len);
    }
    drop(dest_file);
    drop(src_file);
    fs::copy(src, dest).map_err(|e| e.into())
}

pub fn ensure_dir_exists<T: AsRef<Path>>(dir: T) -> Result<()> {
    let dir = dir.as_ref();
    if !dir.exists() {
        create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    Ok(())
}

/// chmod +x for owner, group and other.
pub fn set_executable<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let mode = fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .mode();
    chmod(path, Mode::from_raw_mode(mode | 0o111))
        .with_context(|| format!("Failed to make {} executable", path.display()))?;
    Ok(())
}

pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether `path` lies under `dir`, comparing resolved paths when they exist.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    let resolve = |p: &Path| {
        p.canonicalize()
            .ok()
            .or_else(|| {
                let parent = p.parent()?.canonicalize().ok()?;
                Some(parent.join(p.file_name()?))
            })
            .unwrap_or_else(|| p.to_path_buf())
    };
    resolve(path).starts_with(resolve(dir))
}

/// Filesystem-safe identifier for a display name: lowercase, letters and
/// digits only, runs of whitespace, `_` and `-` collapsed into one `-`.
/// "My App" and "my-app" share a slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.trim().to_lowercase().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_separator = true;
        } else if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        }
    }

    if slug.is_empty() {
        defs::DEFAULT_SLUG.to_string()
    } else {
        slug
    }
}

/// "Foo.AppImage" -> "Foo"; any other file name is kept whole.
pub fn suggest_name_from_file(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_string_lossy();
    let suffix = format!(".{}", defs::ARTIFACT_EXTENSION);
    let name = match file_name.len().checked_sub(suffix.len()) {
        Some(at)
            if file_name.is_char_boundary(at) && file_name[at..].eq_ignore_ascii_case(&suffix) =>
        {
            &file_name[..at]
        }
        _ => file_name.as_ref(),
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

pub fn read_text_lossy<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<String> {
    let path = path.as_ref();
    let mut data = Vec::new();
    File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .take(max_bytes)
        .read_to_end(&mut data)?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Asks the desktop to rebuild its launcher cache. Only affects how quickly
/// menus notice changes, so every failure is dropped.
pub fn refresh_launcher_cache(launcher_dir: &Path) {
    let status = Command::new(defs::LAUNCHER_CACHE_TOOL)
        .arg(launcher_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => log::debug!("Launcher cache refreshed"),
        Ok(status) => log::debug!("{} exited with {}", defs::LAUNCHER_CACHE_TOOL, status),
        Err(e) => log::debug!("{} unavailable: {}", defs::LAUNCHER_CACHE_TOOL, e),
    }
}
