// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::BTreeSet,
    ffi::OsStr,
    fs,
    os::unix::ffi::OsStrExt,
    path::PathBuf,
};

use procfs::process::{MountInfo, Process};
use serde::Serialize;

use crate::defs;

/// One line of the live mount table. Rebuilt on every query because mounts
/// come and go while we run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountEntry {
    pub mountpoint: PathBuf,
    pub filesystem_type: String,
    pub device: String,
    pub options: BTreeSet<String>,
}

impl From<MountInfo> for MountEntry {
    fn from(info: MountInfo) -> Self {
        // Per-mount flags (noexec lives here) and superblock options together
        // match what /proc/mounts reports.
        let options = info
            .mount_options
            .into_iter()
            .chain(info.super_options)
            .map(|(key, value)| match value {
                Some(value) => format!("{key}={value}"),
                None => key,
            })
            .collect();

        Self {
            mountpoint: unescape_octal(&info.mount_point.to_string_lossy()),
            filesystem_type: info.fs_type,
            device: info.mount_source.unwrap_or_default(),
            options,
        }
    }
}

/// Reads the mount table of the current process. An unreadable table yields
/// an empty list and callers treat that as "unknown".
pub fn list_mounts() -> Vec<MountEntry> {
    if let Ok(process) = Process::myself()
        && let Ok(mountinfo) = process.mountinfo()
    {
        return mountinfo.into_iter().map(MountEntry::from).collect();
    }

    match fs::read_to_string(defs::PROC_MOUNTS) {
        Ok(content) => parse_mounts(&content),
        Err(e) => {
            log::debug!("Mount table unavailable ({}): {}", defs::PROC_MOUNTS, e);
            Vec::new()
        }
    }
}

/// Parses `/proc/mounts` formatted text: device, mountpoint, type, options,
/// then two numeric fields we ignore. Short lines are skipped.
pub fn parse_mounts(content: &str) -> Vec<MountEntry> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mountpoint = fields.next()?;
            let filesystem_type = fields.next()?;
            let options = fields.next()?;

            Some(MountEntry {
                mountpoint: unescape_octal(mountpoint),
                filesystem_type: filesystem_type.to_string(),
                device: unescape_octal(device).to_string_lossy().into_owned(),
                options: options
                    .split(',')
                    .filter(|opt| !opt.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
        })
        .collect()
}

/// The kernel writes space, tab, newline and backslash in mount fields as
/// three-digit octal escapes (`\040` for a space).
pub fn unescape_octal(raw: &str) -> PathBuf {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && let Some(value) = octal_triplet(&bytes[i + 1..i + 4])
        {
            out.push(value);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    PathBuf::from(OsStr::from_bytes(&out))
}

fn octal_triplet(digits: &[u8]) -> Option<u8> {
    let mut value: u16 = 0;
    for &d in digits {
        if !(b'0'..=b'7').contains(&d) {
            return None;
        }
        value = value * 8 + u16::from(d - b'0');
    }
    u8::try_from(value).ok()
}
