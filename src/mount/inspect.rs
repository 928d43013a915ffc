// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::{Path, PathBuf};

use crate::{
    defs,
    mount::table::{MountEntry, list_mounts},
};

/// Most specific mount containing `path` in the live table.
pub fn find_mount_for(path: &Path) -> Option<MountEntry> {
    let resolved = resolve(path);
    find_mount_in(&list_mounts(), &resolved).cloned()
}

/// True when binaries on the filesystem holding `path` are unlikely to run.
/// Without mount data we assume they will.
pub fn is_non_executable(path: &Path) -> bool {
    find_mount_for(path).is_some_and(|entry| blocks_execution(&entry))
}

pub fn blocks_execution(entry: &MountEntry) -> bool {
    if entry.options.contains(defs::NOEXEC_OPTION) {
        return true;
    }
    let fstype = entry.filesystem_type.to_lowercase();
    defs::RESTRICTIVE_FSTYPES.contains(&fstype.as_str())
}

/// Longest mountpoint that is a component-wise prefix of `path`. On equal
/// length the later entry wins, since it is stacked over the earlier one.
pub fn find_mount_in<'a>(mounts: &'a [MountEntry], path: &Path) -> Option<&'a MountEntry> {
    let mut best: Option<&MountEntry> = None;
    let mut best_len = 0;

    for entry in mounts {
        if !path.starts_with(&entry.mountpoint) {
            continue;
        }
        let len = entry.mountpoint.as_os_str().len();
        if best.is_none() || len >= best_len {
            best = Some(entry);
            best_len = len;
        }
    }
    best
}

fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
