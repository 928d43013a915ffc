// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::HashMap,
    fmt::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Result;

use crate::{defs, utils};

/// Key/value pairs of the `[Desktop Entry]` section of a launcher file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesktopEntry {
    fields: HashMap<String, String>,
}

impl DesktopEntry {
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = utils::read_text_lossy(path, defs::DESCRIPTOR_MAX_BYTES)?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut fields = HashMap::new();
        let mut in_entry = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                in_entry = line == defs::DESKTOP_SECTION;
                continue;
            }
            if !in_entry {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                fields.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Self { fields }
    }

    /// Value of `key`; empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn is_owned(&self) -> bool {
        self.fields.get(defs::OWNER_TAG).map(String::as_str) == Some(defs::OWNER_TAG_VALUE)
    }

    /// `Name`, then the localized name for `lang`, then the English one.
    pub fn display_name(&self, lang: Option<&str>) -> Option<&str> {
        self.get("Name")
            .or_else(|| lang.and_then(|lang| self.get(&format!("Name[{lang}]"))))
            .or_else(|| self.get("Name[en]"))
    }
}

/// Launcher written for an installed artifact.
#[derive(Debug, Clone)]
pub struct LauncherEntry {
    pub name: String,
    pub comment: String,
    pub exec_path: PathBuf,
    pub icon: Option<PathBuf>,
    pub categories: String,
    /// Extra `key=value` lines appended after the standard keys.
    pub extra: Vec<(String, String)>,
}

impl LauncherEntry {
    /// Entry carrying the ownership tag and the structured artifact and icon
    /// paths read back by the record store.
    pub fn owned(
        name: &str,
        comment: &str,
        categories: &str,
        artifact: &Path,
        icon: Option<&Path>,
    ) -> Self {
        let icon_value = icon
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name: name.to_string(),
            comment: comment.to_string(),
            exec_path: artifact.to_path_buf(),
            icon: icon.map(Path::to_path_buf),
            categories: categories.to_string(),
            extra: vec![
                (defs::OWNER_TAG.to_string(), defs::OWNER_TAG_VALUE.to_string()),
                (
                    defs::ARTIFACT_PATH_KEY.to_string(),
                    artifact.to_string_lossy().into_owned(),
                ),
                (defs::ICON_PATH_KEY.to_string(), icon_value),
            ],
        }
    }

    pub fn render(&self) -> String {
        let icon = self
            .icon
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| defs::GENERIC_ICON.to_string());
        let categories = if self.categories.trim().is_empty() {
            defs::DEFAULT_CATEGORIES
        } else {
            self.categories.trim()
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}", defs::DESKTOP_SECTION);
        let _ = writeln!(out, "Type=Application");
        let _ = writeln!(out, "Name={}", single_line(&self.name));
        let _ = writeln!(out, "Comment={}", single_line(&self.comment));
        let _ = writeln!(out, "Exec=\"{}\" %U", self.exec_path.display());
        let _ = writeln!(out, "Icon={icon}");
        let _ = writeln!(out, "Terminal=false");
        let _ = writeln!(out, "Categories={}", single_line(categories));
        let _ = writeln!(out, "StartupNotify=true");
        for (key, value) in &self.extra {
            let _ = writeln!(out, "{key}={}", single_line(value));
        }
        out
    }
}

// A stray newline would start a new key in the descriptor.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_only_main_section() {
        let entry = DesktopEntry::parse(
            "# comment\n\
             Name=Outside\n\
             [Desktop Entry]\n\
             Name = Tool \n\
             \n\
             # Icon=commented\n\
             Icon=tool\n\
             Exec=tool --flag=1\n\
             [Desktop Action New]\n\
             Name=New Window\n",
        );
        assert_eq!(entry.get("Name"), Some("Tool"));
        assert_eq!(entry.get("Icon"), Some("tool"));
        assert_eq!(entry.get("Exec"), Some("tool --flag=1"));
        assert_eq!(entry.get("Outside"), None);
    }

    #[test]
    fn later_keys_overwrite() {
        let entry = DesktopEntry::parse("[Desktop Entry]\nName=A\nName=B\n");
        assert_eq!(entry.get("Name"), Some("B"));
    }

    #[test]
    fn empty_value_is_absent() {
        let entry = DesktopEntry::parse("[Desktop Entry]\nIcon=\nNoEquals\n");
        assert_eq!(entry.get("Icon"), None);
        assert_eq!(entry.get("NoEquals"), None);
    }

    #[test]
    fn localized_name_fallback() {
        let entry = DesktopEntry::parse("[Desktop Entry]\nName[fr]=Outil\nName[en]=Tool\n");
        assert_eq!(entry.display_name(Some("fr")), Some("Outil"));
        assert_eq!(entry.display_name(Some("de")), Some("Tool"));
        assert_eq!(entry.display_name(None), Some("Tool"));
    }

    #[test]
    fn ownership_requires_exact_tag() {
        assert!(DesktopEntry::parse("[Desktop Entry]\nX-AppShelf-Installer=true\n").is_owned());
        assert!(!DesktopEntry::parse("[Desktop Entry]\nX-AppShelf-Installer=yes\n").is_owned());
        assert!(!DesktopEntry::parse("[Other]\nX-AppShelf-Installer=true\n").is_owned());
    }

    #[test]
    fn rendered_entry_parses_back() {
        let launcher = LauncherEntry::owned(
            "My Tool",
            "Does\nthings",
            "",
            Path::new("/apps/my-tool.AppImage"),
            None,
        );
        let text = launcher.render();
        let entry = DesktopEntry::parse(&text);

        assert_eq!(entry.get("Name"), Some("My Tool"));
        assert_eq!(entry.get("Comment"), Some("Does things"));
        assert_eq!(entry.get("Exec"), Some("\"/apps/my-tool.AppImage\" %U"));
        assert_eq!(entry.get("Icon"), Some(defs::GENERIC_ICON));
        assert_eq!(entry.get("Categories"), Some(defs::DEFAULT_CATEGORIES));
        assert_eq!(entry.get(defs::ARTIFACT_PATH_KEY), Some("/apps/my-tool.AppImage"));
        assert_eq!(entry.get(defs::ICON_PATH_KEY), None);
        assert!(entry.is_owned());
    }
}
