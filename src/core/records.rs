// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result};
use regex_lite::Regex;
use serde::Serialize;

use crate::{conf::config::Layout, core::descriptor::DesktopEntry, defs, utils};

static EXEC_ARTIFACT_REGEX: OnceLock<Regex> = OnceLock::new();

/// Read projection of one tagged launcher file. The launcher file on disk is
/// the only persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallRecord {
    pub display_name: String,
    pub descriptor_path: PathBuf,
    pub artifact_path: Option<PathBuf>,
    pub icon_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedFile {
    Descriptor,
    Artifact,
    Icon,
}

impl fmt::Display for ManagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ManagedFile::Descriptor => "launcher",
            ManagedFile::Artifact => "artifact",
            ManagedFile::Icon => "icon",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    /// Already gone. Not an error.
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRemoval {
    pub kind: ManagedFile,
    pub path: PathBuf,
    pub outcome: RemovalOutcome,
}

/// Per-file result of an uninstall, so partial removals stay visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub files: Vec<FileRemoval>,
}

impl RemovalReport {
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileRemoval> {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, RemovalOutcome::Failed(_)))
    }

    #[cfg(test)]
    pub fn outcome_of(&self, kind: ManagedFile) -> Option<&RemovalOutcome> {
        self.files.iter().find(|f| f.kind == kind).map(|f| &f.outcome)
    }
}

pub struct RecordStore<'a> {
    layout: &'a Layout,
}

impl<'a> RecordStore<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// Record as it will exist once its launcher is written. Paths derive from
    /// the slug of `display_name`.
    pub fn record_for(
        &self,
        display_name: &str,
        artifact_path: Option<PathBuf>,
        icon_path: Option<PathBuf>,
    ) -> InstallRecord {
        InstallRecord {
            display_name: display_name.to_string(),
            descriptor_path: self.layout.descriptor_path(&utils::slugify(display_name)),
            artifact_path,
            icon_path,
        }
    }

    /// Every launcher carrying the ownership tag, sorted by name ignoring case.
    pub fn list_records(&self) -> Vec<InstallRecord> {
        let dir = &self.layout.launcher_dir;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("Launcher directory {} not readable: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut records: Vec<InstallRecord> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == defs::DESKTOP_EXTENSION)
                    && path.is_file()
            })
            .filter_map(|path| self.read_record(&path))
            .collect();

        records.sort_by_key(|r| r.display_name.to_lowercase());
        records
    }

    pub fn find(&self, name: &str) -> Option<InstallRecord> {
        let records = self.list_records();
        let slug_path = self.layout.descriptor_path(&utils::slugify(name));
        records
            .iter()
            .find(|r| r.display_name == name)
            .or_else(|| records.iter().find(|r| r.descriptor_path == slug_path))
            .cloned()
    }

    /// Record stored in the launcher at `path`, if that launcher is ours.
    pub fn record_at(&self, path: &Path) -> Option<InstallRecord> {
        if !path.is_file() {
            return None;
        }
        self.read_record(path)
    }

    fn read_record(&self, path: &Path) -> Option<InstallRecord> {
        let entry = match DesktopEntry::parse_file(path) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable launcher {}: {:#}", path.display(), e);
                return None;
            }
        };
        if !entry.is_owned() {
            return None;
        }

        let display_name = entry
            .get("Name")
            .map(str::to_string)
            .unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        let artifact_path = entry
            .get(defs::ARTIFACT_PATH_KEY)
            .and_then(|value| contained(value, &self.layout.install_dir, path))
            .or_else(|| self.artifact_from_exec(entry.get("Exec")?));

        let icon_path = entry
            .get(defs::ICON_PATH_KEY)
            .and_then(|value| contained(value, &self.layout.icon_dir, path))
            .or_else(|| self.icon_from_reference(entry.get("Icon")?));

        Some(InstallRecord {
            display_name,
            descriptor_path: path.to_path_buf(),
            artifact_path,
            icon_path,
        })
    }

    // Older or hand-edited launchers may lack the structured field. The quoted
    // path in Exec is only trusted inside the install directory.
    fn artifact_from_exec(&self, exec: &str) -> Option<PathBuf> {
        let re = EXEC_ARTIFACT_REGEX.get_or_init(|| {
            Regex::new(r#""([^"]+\.(?i:appimage))""#).expect("Invalid Regex pattern")
        });
        let path = PathBuf::from(re.captures(exec)?.get(1)?.as_str());
        if utils::is_within(&path, &self.layout.install_dir) {
            Some(path)
        } else {
            log::debug!("Ignoring Exec path outside install dir: {}", path.display());
            None
        }
    }

    fn icon_from_reference(&self, icon: &str) -> Option<PathBuf> {
        let path = Path::new(icon);
        (path.is_absolute() && path.exists() && utils::is_within(path, &self.layout.icon_dir))
            .then(|| path.to_path_buf())
    }

    pub fn write_record(&self, record: &InstallRecord, content: &str) -> Result<()> {
        if let Some(parent) = record.descriptor_path.parent() {
            utils::ensure_dir_exists(parent)?;
        }
        utils::atomic_write(&record.descriptor_path, content).with_context(|| {
            format!(
                "Failed to write launcher {}",
                record.descriptor_path.display()
            )
        })?;
        log::info!("Launcher written: {}", record.descriptor_path.display());
        Ok(())
    }

    /// Deletes launcher, artifact and icon in that order. Each file is tried
    /// regardless of what happened to the previous one. A launcher without
    /// the ownership tag is left alone together with everything it names, and
    /// no path outside its managed directory is ever deleted.
    pub fn remove_record(&self, record: &InstallRecord) -> RemovalReport {
        let mut report = RemovalReport::default();

        if record.descriptor_path.exists()
            && !DesktopEntry::parse_file(&record.descriptor_path).is_ok_and(|e| e.is_owned())
        {
            report.files.push(FileRemoval {
                kind: ManagedFile::Descriptor,
                path: record.descriptor_path.clone(),
                outcome: RemovalOutcome::Failed("launcher is not managed by appshelf".into()),
            });
            return report;
        }

        let targets = [
            (ManagedFile::Descriptor, Some(&record.descriptor_path), &self.layout.launcher_dir),
            (ManagedFile::Artifact, record.artifact_path.as_ref(), &self.layout.install_dir),
            (ManagedFile::Icon, record.icon_path.as_ref(), &self.layout.icon_dir),
        ];
        for (kind, path, managed_dir) in targets {
            let Some(path) = path else { continue };
            let outcome = if utils::is_within(path, managed_dir) {
                remove_one(path)
            } else {
                RemovalOutcome::Failed(format!("outside {}", managed_dir.display()))
            };
            match &outcome {
                RemovalOutcome::Removed => log::info!("Removed {}: {}", kind, path.display()),
                RemovalOutcome::Missing => log::debug!("Already gone {}: {}", kind, path.display()),
                RemovalOutcome::Failed(e) => {
                    log::warn!("Failed to remove {} {}: {}", kind, path.display(), e)
                }
            }
            report.files.push(FileRemoval {
                kind,
                path: path.clone(),
                outcome,
            });
        }

        report
    }
}

// Structured paths are written by us, but the file may have been edited since.
fn contained(value: &str, dir: &Path, launcher: &Path) -> Option<PathBuf> {
    let path = PathBuf::from(value);
    if utils::is_within(&path, dir) {
        Some(path)
    } else {
        log::warn!(
            "{}: ignoring {} outside {}",
            launcher.display(),
            path.display(),
            dir.display()
        );
        None
    }
}

fn remove_one(path: &Path) -> RemovalOutcome {
    match fs::remove_file(path) {
        Ok(()) => RemovalOutcome::Removed,
        Err(e) if e.kind() == io::ErrorKind::NotFound => RemovalOutcome::Missing,
        Err(e) => RemovalOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::descriptor::LauncherEntry;
    use tempfile::{TempDir, tempdir};

    fn layout(dir: &TempDir) -> Layout {
        let layout = Layout {
            install_dir: dir.path().join("apps"),
            launcher_dir: dir.path().join("launchers"),
            icon_dir: dir.path().join("icons"),
        };
        for d in [&layout.install_dir, &layout.launcher_dir, &layout.icon_dir] {
            fs::create_dir_all(d).unwrap();
        }
        layout
    }

    fn install_fake(store: &RecordStore, layout: &Layout, name: &str, with_icon: bool) -> InstallRecord {
        let slug = utils::slugify(name);
        let artifact = layout.artifact_path(&slug);
        fs::write(&artifact, b"bin").unwrap();
        let icon = with_icon.then(|| {
            let icon = layout.icon_path(&slug, "png");
            fs::write(&icon, b"png").unwrap();
            icon
        });
        let record = store.record_for(name, Some(artifact.clone()), icon.clone());
        let content = LauncherEntry::owned(name, "", "", &artifact, icon.as_deref()).render();
        store.write_record(&record, &content).unwrap();
        record
    }

    #[test]
    fn lists_only_tagged_launchers_sorted() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);

        install_fake(&store, &layout, "zeta", false);
        install_fake(&store, &layout, "Alpha", true);
        fs::write(
            layout.launcher_dir.join("firefox.desktop"),
            "[Desktop Entry]\nName=Firefox\nExec=firefox %u\n",
        )
        .unwrap();
        fs::write(
            layout.launcher_dir.join("other.desktop"),
            "[Desktop Entry]\nName=Other\nX-AppShelf-Installer=false\n",
        )
        .unwrap();
        fs::write(layout.launcher_dir.join("notes.txt"), "X-AppShelf-Installer=true").unwrap();

        let names: Vec<_> = store
            .list_records()
            .into_iter()
            .map(|r| r.display_name)
            .collect();
        assert_eq!(names, ["Alpha", "zeta"]);
    }

    #[test]
    fn structured_fields_read_back() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);

        let written = install_fake(&store, &layout, "My Tool", true);
        let listed = store.list_records();
        assert_eq!(listed, vec![written]);
        assert_eq!(listed[0].descriptor_path, layout.launcher_dir.join("my-tool.desktop"));
    }

    #[test]
    fn exec_and_icon_fallbacks() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);

        let artifact = layout.install_dir.join("legacy.AppImage");
        let icon = layout.icon_dir.join("legacy.svg");
        fs::write(&icon, "<svg/>").unwrap();
        fs::write(
            layout.launcher_dir.join("legacy.desktop"),
            format!(
                "[Desktop Entry]\nExec=\"{}\" %U\nIcon={}\nX-AppShelf-Installer=true\n",
                artifact.display(),
                icon.display()
            ),
        )
        .unwrap();

        let record = &store.list_records()[0];
        assert_eq!(record.display_name, "legacy.desktop");
        assert_eq!(record.artifact_path.as_ref(), Some(&artifact));
        assert_eq!(record.icon_path.as_ref(), Some(&icon));
    }

    #[test]
    fn fallbacks_outside_managed_dirs_ignored() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);

        let foreign_icon = dir.path().join("system-icon.png");
        fs::write(&foreign_icon, b"png").unwrap();
        fs::write(
            layout.launcher_dir.join("odd.desktop"),
            format!(
                "[Desktop Entry]\nName=Odd\nExec=\"/usr/bin/Other.AppImage\" %U\nIcon={}\nX-AppShelf-Installer=true\n",
                foreign_icon.display()
            ),
        )
        .unwrap();

        let record = &store.list_records()[0];
        assert_eq!(record.artifact_path, None);
        assert_eq!(record.icon_path, None);
    }

    #[test]
    fn structured_paths_outside_managed_dirs_never_deleted() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);

        let thesis = dir.path().join("thesis.odt");
        let photo = dir.path().join("photo.png");
        fs::write(&thesis, b"years of work").unwrap();
        fs::write(&photo, b"png").unwrap();
        let launcher = layout.launcher_dir.join("tampered.desktop");
        fs::write(
            &launcher,
            format!(
                "[Desktop Entry]\nName=Tampered\nX-AppShelf-Installer=true\n\
                 X-AppShelf-ArtifactPath={}\nX-AppShelf-IconPath={}\n",
                thesis.display(),
                photo.display()
            ),
        )
        .unwrap();

        let record = store.find("Tampered").unwrap();
        assert_eq!(record.artifact_path, None);
        assert_eq!(record.icon_path, None);

        let report = store.remove_record(&record);
        assert!(report.is_clean());
        assert!(!launcher.exists());
        assert!(thesis.exists());
        assert!(photo.exists());
    }

    #[test]
    fn hand_built_record_cannot_reach_outside() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);

        let mut record = install_fake(&store, &layout, "Tool", false);
        let outside = dir.path().join("notes.txt");
        fs::write(&outside, b"keep").unwrap();
        record.artifact_path = Some(outside.clone());

        let report = store.remove_record(&record);
        assert!(matches!(
            report.outcome_of(ManagedFile::Artifact),
            Some(RemovalOutcome::Failed(_))
        ));
        assert!(outside.exists());
    }

    #[test]
    fn unreadable_launcher_skipped() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);
        install_fake(&store, &layout, "Good", false);
        // a directory with the right extension cannot be parsed
        fs::create_dir(layout.launcher_dir.join("broken.desktop")).unwrap();

        assert_eq!(store.list_records().len(), 1);
    }

    #[test]
    fn missing_launcher_dir_is_empty() {
        let dir = tempdir().unwrap();
        let layout = Layout {
            install_dir: dir.path().join("a"),
            launcher_dir: dir.path().join("nope"),
            icon_dir: dir.path().join("i"),
        };
        assert!(RecordStore::new(&layout).list_records().is_empty());
    }

    #[test]
    fn remove_tolerates_missing_files() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);

        let record = install_fake(&store, &layout, "Gone", true);
        fs::remove_file(record.artifact_path.as_ref().unwrap()).unwrap();

        let report = store.remove_record(&record);
        assert!(report.is_clean());
        assert_eq!(report.outcome_of(ManagedFile::Descriptor), Some(&RemovalOutcome::Removed));
        assert_eq!(report.outcome_of(ManagedFile::Artifact), Some(&RemovalOutcome::Missing));
        assert_eq!(report.outcome_of(ManagedFile::Icon), Some(&RemovalOutcome::Removed));
        assert!(!record.descriptor_path.exists());
        assert!(store.list_records().is_empty());
    }

    #[test]
    fn remove_reports_each_failure_independently() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);

        let mut record = install_fake(&store, &layout, "Stuck", true);
        // removing a non-empty directory with remove_file fails regardless of privileges
        let stuck = layout.install_dir.join("stuck-dir");
        fs::create_dir_all(stuck.join("inner")).unwrap();
        record.artifact_path = Some(stuck.clone());

        let report = store.remove_record(&record);
        assert!(!report.is_clean());
        assert!(matches!(
            report.outcome_of(ManagedFile::Artifact),
            Some(RemovalOutcome::Failed(_))
        ));
        assert_eq!(report.outcome_of(ManagedFile::Icon), Some(&RemovalOutcome::Removed));
        assert_eq!(report.outcome_of(ManagedFile::Descriptor), Some(&RemovalOutcome::Removed));
        assert!(stuck.exists());
    }

    #[test]
    fn untagged_launcher_never_removed() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);

        let foreign = layout.launcher_dir.join("firefox.desktop");
        fs::write(&foreign, "[Desktop Entry]\nName=Firefox\n").unwrap();
        let artifact = layout.install_dir.join("keep.AppImage");
        fs::write(&artifact, b"bin").unwrap();
        let record = InstallRecord {
            display_name: "Firefox".into(),
            descriptor_path: foreign.clone(),
            artifact_path: Some(artifact.clone()),
            icon_path: None,
        };

        let report = store.remove_record(&record);
        assert!(!report.is_clean());
        assert!(foreign.exists());
        assert!(artifact.exists());
    }

    #[test]
    fn find_by_name_or_slug() {
        let dir = tempdir().unwrap();
        let layout = layout(&dir);
        let store = RecordStore::new(&layout);
        install_fake(&store, &layout, "My Tool", false);

        assert!(store.find("My Tool").is_some());
        assert!(store.find("my-tool").is_some());
        assert!(store.find("Other").is_none());
    }
}
