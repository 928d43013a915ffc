// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::defs;

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_default()
        .join(defs::CONFIG_DIR_NAME)
        .join(defs::CONFIG_FILE_NAME)
}

fn default_install_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("Applications"))
        .unwrap_or_default()
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub install_dir: PathBuf,
    pub launcher_dir: PathBuf,
    pub icon_dir: PathBuf,
    pub extract_icons: bool,
    pub extract_timeout_secs: u64,
    pub refresh_launcher_cache: bool,
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let data = default_data_dir();
        Self {
            install_dir: default_install_dir(),
            launcher_dir: data.join("applications"),
            icon_dir: data.join("icons").join(defs::CONFIG_DIR_NAME),
            extract_icons: true,
            extract_timeout_secs: defs::DEFAULT_EXTRACT_TIMEOUT_SECS,
            refresh_launcher_cache: true,
            verbose: false,
            log_file: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn merge_with_cli(&mut self, install_dir: Option<PathBuf>, verbose: bool, no_extract: bool) {
        if let Some(dir) = install_dir {
            self.install_dir = dir;
        }
        if verbose {
            self.verbose = true;
        }
        if no_extract {
            self.extract_icons = false;
        }
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }

    pub fn layout(&self) -> Layout {
        Layout {
            install_dir: self.install_dir.clone(),
            launcher_dir: self.launcher_dir.clone(),
            icon_dir: self.icon_dir.clone(),
        }
    }
}

/// Directories managed by this tool. Built once from the config and handed
/// to every component that touches disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub install_dir: PathBuf,
    pub launcher_dir: PathBuf,
    pub icon_dir: PathBuf,
}

impl Layout {
    pub fn artifact_path(&self, slug: &str) -> PathBuf {
        self.install_dir
            .join(format!("{slug}.{}", defs::ARTIFACT_EXTENSION))
    }

    pub fn descriptor_path(&self, slug: &str) -> PathBuf {
        self.launcher_dir
            .join(format!("{slug}.{}", defs::DESKTOP_EXTENSION))
    }

    pub fn icon_path(&self, slug: &str, extension: &str) -> PathBuf {
        self.icon_dir.join(format!("{slug}.{extension}"))
    }

    pub fn self_artifact_path(&self) -> PathBuf {
        self.install_dir
            .join(defs::SELF_DIR_NAME)
            .join(defs::SELF_ARTIFACT_NAME)
    }

    pub fn self_descriptor_path(&self) -> PathBuf {
        self.launcher_dir.join(defs::SELF_DESKTOP_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str("install_dir = \"/opt/apps\"\nextract_icons = false\n")
            .unwrap();
        assert_eq!(config.install_dir, PathBuf::from("/opt/apps"));
        assert!(!config.extract_icons);
        assert_eq!(config.extract_timeout_secs, defs::DEFAULT_EXTRACT_TIMEOUT_SECS);
        assert!(config.refresh_launcher_cache);
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.install_dir = dir.path().join("apps");
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.install_dir, dir.path().join("apps"));
    }

    #[test]
    fn cli_overrides() {
        let mut config = Config::default();
        config.merge_with_cli(Some(PathBuf::from("/srv/apps")), true, true);
        assert_eq!(config.install_dir, PathBuf::from("/srv/apps"));
        assert!(config.verbose);
        assert!(!config.extract_icons);
    }

    #[test]
    fn layout_paths_follow_slug() {
        let layout = Layout {
            install_dir: PathBuf::from("/d"),
            launcher_dir: PathBuf::from("/l"),
            icon_dir: PathBuf::from("/i"),
        };
        assert_eq!(layout.artifact_path("my-tool"), PathBuf::from("/d/my-tool.AppImage"));
        assert_eq!(layout.descriptor_path("my-tool"), PathBuf::from("/l/my-tool.desktop"));
        assert_eq!(layout.icon_path("my-tool", "svg"), PathBuf::from("/i/my-tool.svg"));
        assert_eq!(
            layout.self_artifact_path(),
            PathBuf::from("/d/AppShelf/AppShelf.AppImage")
        );
    }
}
