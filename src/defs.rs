// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub const APP_NAME: &str = "AppShelf";
pub const CONFIG_DIR_NAME: &str = "appshelf";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const PROC_MOUNTS: &str = "/proc/self/mounts";
pub const NOEXEC_OPTION: &str = "noexec";

// FAT family, exFAT, kernel NTFS drivers and network shares
pub const RESTRICTIVE_FSTYPES: &[&str] = &[
    "vfat", "msdos", "fat", "exfat", "ntfs", "ntfs3", "cifs", "smbfs", "smb3",
];

/// Set by the AppImage runtime to the path of the running artifact.
pub const ARTIFACT_ENV: &str = "APPIMAGE";
pub const ARTIFACT_EXTENSION: &str = "AppImage";
pub const EXTRACT_FLAG: &str = "--appimage-extract";
pub const EXTRACT_ROOT_NAME: &str = "squashfs-root";
pub const EXTRACT_DIR_PREFIX: &str = "appshelf-extract-";
pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 120;

pub const SELF_DIR_NAME: &str = "AppShelf";
pub const SELF_ARTIFACT_NAME: &str = "AppShelf.AppImage";
pub const SELF_DESKTOP_NAME: &str = "appshelf.desktop";
pub const SELF_TAG: &str = "X-AppShelf-Self";

pub const DESKTOP_SECTION: &str = "[Desktop Entry]";
pub const DESKTOP_EXTENSION: &str = "desktop";
pub const DESCRIPTOR_MAX_BYTES: u64 = 300_000;

pub const OWNER_TAG: &str = "X-AppShelf-Installer";
pub const OWNER_TAG_VALUE: &str = "true";
pub const ARTIFACT_PATH_KEY: &str = "X-AppShelf-ArtifactPath";
pub const ICON_PATH_KEY: &str = "X-AppShelf-IconPath";

pub const GENERIC_ICON: &str = "application-x-executable";
pub const DEFAULT_CATEGORIES: &str = "Utility;";
pub const DEFAULT_SLUG: &str = "appimage";

pub const MANUAL_ICON_EXTENSIONS: &[&str] = &["png", "svg", "ico", "jpg", "jpeg"];
pub const EXTRACTED_ICON_EXTENSIONS: &[&str] = &["png", "svg"];
pub const FALLBACK_ICON_EXTENSION: &str = "png";

pub const HICOLOR_DIR: &str = "usr/share/icons/hicolor";
pub const EMBEDDED_DESKTOP_DIR: &str = "usr/share/applications";

pub const LAUNCHER_CACHE_TOOL: &str = "update-desktop-database";
