// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod confirm;
pub mod descriptor;
pub mod extract;
pub mod icon;
pub mod records;
pub mod relocate;
pub mod worker;

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;

use crate::{
    conf::config::{Config, Layout},
    core::{
        confirm::Confirm,
        descriptor::LauncherEntry,
        extract::ExtractedMetadata,
        records::{InstallRecord, RecordStore, RemovalReport},
    },
    defs, utils,
};

#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub artifact: PathBuf,
    pub name: String,
    pub comment: String,
    pub categories: String,
    pub manual_icon: Option<PathBuf>,
    pub extract_icons: bool,
    pub extract_timeout: Duration,
    pub refresh_launcher_cache: bool,
}

impl InstallRequest {
    pub fn new(artifact: PathBuf, name: String, config: &Config) -> Self {
        Self {
            artifact,
            name,
            comment: String::new(),
            categories: String::new(),
            manual_icon: None,
            extract_icons: config.extract_icons,
            extract_timeout: config.extract_timeout(),
            refresh_launcher_cache: config.refresh_launcher_cache,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("artifact {0} does not exist")]
    MissingArtifact(PathBuf),
    #[error("artifact {0} is not a regular file")]
    NotAFile(PathBuf),
    #[error("application name is empty")]
    EmptyName,
    #[error("install directory is not set")]
    NoInstallDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum IconSource {
    Manual(PathBuf),
    Extracted(PathBuf),
    Generic,
}

impl IconSource {
    fn path(&self) -> Option<&Path> {
        match self {
            IconSource::Manual(p) | IconSource::Extracted(p) => Some(p),
            IconSource::Generic => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub record: InstallRecord,
    pub icon: IconSource,
    /// Advisory problems that did not stop the install.
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(InstallReport),
    Cancelled,
}

pub struct Init;

pub struct Validated {
    name: String,
    slug: String,
    manual_icon: Option<PathBuf>,
}

pub struct Staged {
    name: String,
    slug: String,
    manual_icon: Option<PathBuf>,
    artifact: PathBuf,
}

pub struct IconReady {
    name: String,
    artifact: PathBuf,
    icon: IconSource,
}

pub struct Recorded {
    record: InstallRecord,
    icon: IconSource,
}

pub struct Installer<'a, S> {
    request: &'a InstallRequest,
    layout: &'a Layout,
    notes: Vec<String>,
    state: S,
}

impl<'a> Installer<'a, Init> {
    pub fn new(request: &'a InstallRequest, layout: &'a Layout) -> Self {
        Self {
            request,
            layout,
            notes: Vec::new(),
            state: Init,
        }
    }

    /// Checks inputs before anything is written.
    pub fn validate(mut self) -> Result<Installer<'a, Validated>, ValidationError> {
        let artifact = &self.request.artifact;
        if !artifact.exists() {
            return Err(ValidationError::MissingArtifact(artifact.clone()));
        }
        if !artifact.is_file() {
            return Err(ValidationError::NotAFile(artifact.clone()));
        }
        let name = self.request.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.layout.install_dir.as_os_str().is_empty() {
            return Err(ValidationError::NoInstallDir);
        }

        let manual_icon = match &self.request.manual_icon {
            Some(icon) if icon.is_file() => Some(icon.clone()),
            Some(icon) => {
                log::warn!("Ignoring icon {}: not a file", icon.display());
                self.notes
                    .push(format!("icon {} is not a file, ignored", icon.display()));
                None
            }
            None => None,
        };

        Ok(Installer {
            request: self.request,
            layout: self.layout,
            notes: self.notes,
            state: Validated {
                name: name.to_string(),
                slug: utils::slugify(name),
                manual_icon,
            },
        })
    }
}

impl<'a> Installer<'a, Validated> {
    /// Copies the artifact into the install directory. `None` when the user
    /// declines to replace an existing install.
    pub fn stage(self, confirm: &mut dyn Confirm) -> Result<Option<Installer<'a, Staged>>> {
        for dir in [
            &self.layout.install_dir,
            &self.layout.launcher_dir,
            &self.layout.icon_dir,
        ] {
            utils::ensure_dir_exists(dir)?;
        }

        let source = &self.request.artifact;
        let dest = self.layout.artifact_path(&self.state.slug);

        if utils::is_same_file(source, &dest) {
            log::info!("{} is already in place", dest.display());
        } else {
            if dest.exists() {
                let question = format!(
                    "{} is already installed at {}. Replace it?",
                    self.state.name,
                    dest.display()
                );
                if !confirm.confirm(&question) {
                    log::info!("Install of {} cancelled", self.state.name);
                    return Ok(None);
                }
            }
            let len = utils::install_file(source, &dest)?;
            log::info!("Copied {} to {} ({} bytes)", source.display(), dest.display(), len);
        }
        utils::set_executable(&dest)?;

        Ok(Some(Installer {
            request: self.request,
            layout: self.layout,
            notes: self.notes,
            state: Staged {
                name: self.state.name,
                slug: self.state.slug,
                manual_icon: self.state.manual_icon,
                artifact: dest,
            },
        }))
    }
}

fn icon_extension(path: &Path, allowed: &[&str]) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| allowed.contains(&e.as_str()))
        .unwrap_or_else(|| defs::FALLBACK_ICON_EXTENSION.to_string())
}

impl<'a> Installer<'a, Staged> {
    /// Never fails. Problems end up as notes and the generic icon.
    pub fn resolve_icon(mut self) -> Installer<'a, IconReady> {
        let icon = match self.state.manual_icon.take() {
            Some(manual) => self.copy_manual_icon(&manual),
            None if self.request.extract_icons => self.extract_icon(),
            None => IconSource::Generic,
        };

        Installer {
            request: self.request,
            layout: self.layout,
            notes: self.notes,
            state: IconReady {
                name: self.state.name,
                artifact: self.state.artifact,
                icon,
            },
        }
    }

    fn copy_manual_icon(&mut self, manual: &Path) -> IconSource {
        let ext = icon_extension(manual, defs::MANUAL_ICON_EXTENSIONS);
        let dest = self.layout.icon_path(&self.state.slug, &ext);
        match utils::install_file(manual, &dest) {
            Ok(_) => IconSource::Manual(dest),
            Err(e) => {
                log::warn!("Icon copy failed: {:#}", e);
                self.notes.push(format!("icon not copied: {e:#}"));
                IconSource::Generic
            }
        }
    }

    fn extract_icon(&mut self) -> IconSource {
        let Some(extraction) =
            extract::extract(&self.state.artifact, self.request.extract_timeout)
        else {
            self.notes
                .push("could not extract the artifact, using the generic icon".to_string());
            return IconSource::Generic;
        };

        let ExtractedMetadata { icon_path, .. } = extraction.metadata();
        let Some(found) = icon_path else {
            self.notes
                .push("no icon inside the artifact, using the generic icon".to_string());
            return IconSource::Generic;
        };

        let ext = icon_extension(&found, defs::EXTRACTED_ICON_EXTENSIONS);
        let dest = self.layout.icon_path(&self.state.slug, &ext);
        match utils::install_file(&found, &dest) {
            Ok(_) => {
                log::info!("Icon extracted to {}", dest.display());
                IconSource::Extracted(dest)
            }
            Err(e) => {
                log::warn!("Extracted icon copy failed: {:#}", e);
                self.notes.push(format!("extracted icon not copied: {e:#}"));
                IconSource::Generic
            }
        }
    }
}

impl<'a> Installer<'a, IconReady> {
    pub fn record(self) -> Result<Installer<'a, Recorded>> {
        let store = RecordStore::new(self.layout);
        let icon_path = self.state.icon.path().map(Path::to_path_buf);
        let record = store.record_for(
            &self.state.name,
            Some(self.state.artifact.clone()),
            icon_path.clone(),
        );

        let content = LauncherEntry::owned(
            &self.state.name,
            &self.request.comment,
            &self.request.categories,
            &self.state.artifact,
            icon_path.as_deref(),
        )
        .render();
        let previous = store.record_at(&record.descriptor_path);
        store
            .write_record(&record, &content)
            .with_context(|| format!("Failed to record install of {}", self.state.name))?;

        let mut notes = self.notes;
        let stale_icon = previous
            .and_then(|p| p.icon_path)
            .filter(|old| record.icon_path.as_ref() != Some(old));
        if let Some(stale) = stale_icon {
            match fs::remove_file(&stale) {
                Ok(()) => log::info!("Removed previous icon {}", stale.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    log::warn!("Failed to remove previous icon {}: {}", stale.display(), e);
                    notes.push(format!("previous icon {} not removed: {e}", stale.display()));
                }
            }
        }

        if self.request.refresh_launcher_cache {
            utils::refresh_launcher_cache(&self.layout.launcher_dir);
        }

        Ok(Installer {
            request: self.request,
            layout: self.layout,
            notes,
            state: Recorded {
                record,
                icon: self.state.icon,
            },
        })
    }
}

impl Installer<'_, Recorded> {
    pub fn finish(self) -> InstallReport {
        log::info!(">> Installed {}", self.state.record.display_name);
        InstallReport {
            record: self.state.record,
            icon: self.state.icon,
            notes: self.notes,
        }
    }
}

/// Full install pipeline. Validation errors come back as [`ValidationError`]
/// inside the `anyhow` error.
pub fn install(
    request: &InstallRequest,
    layout: &Layout,
    confirm: &mut dyn Confirm,
) -> Result<InstallOutcome> {
    let Some(staged) = Installer::new(request, layout).validate()?.stage(confirm)? else {
        return Ok(InstallOutcome::Cancelled);
    };
    let report = staged.resolve_icon().record()?.finish();
    Ok(InstallOutcome::Installed(report))
}

pub fn uninstall(layout: &Layout, record: &InstallRecord, refresh_cache: bool) -> RemovalReport {
    let report = RecordStore::new(layout).remove_record(record);
    if refresh_cache {
        utils::refresh_launcher_cache(&layout.launcher_dir);
    }
    report
}

/// Name to offer when the user gave none: the artifact's own launcher name,
/// else the file name without its extension.
pub fn suggest_name(artifact: &Path, metadata: Option<&ExtractedMetadata>) -> Option<String> {
    metadata
        .and_then(|m| m.suggested_name.clone())
        .filter(|n| !n.trim().is_empty())
        .or_else(|| utils::suggest_name_from_file(artifact))
}
