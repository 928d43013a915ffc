// Copyright 2026 AppShelf Developers
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::defs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IconKind {
    Png,
    Svg,
}

fn icon_kind(path: &Path) -> Option<IconKind> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "png" => Some(IconKind::Png),
        "svg" => Some(IconKind::Svg),
        _ => None,
    }
}

// Sorted so that "first SVG" is stable between runs.
fn icon_files(root: &Path) -> Vec<(PathBuf, IconKind)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            // AppImages often ship the top-level icon as a symlink
            e.file_type().is_file()
                || (e.path_is_symlink() && fs::metadata(e.path()).is_ok_and(|m| m.is_file()))
        })
        .filter_map(|e| {
            let kind = icon_kind(e.path())?;
            Some((e.into_path(), kind))
        })
        .collect()
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Largest PNG by byte size (a proxy for resolution), else the first SVG.
fn pick_best(candidates: &[(PathBuf, IconKind)]) -> Option<PathBuf> {
    let largest_png = candidates
        .iter()
        .filter(|(_, kind)| *kind == IconKind::Png)
        .max_by_key(|(path, _)| file_size(path));
    if let Some((path, _)) = largest_png {
        return Some(path.clone());
    }
    candidates
        .iter()
        .find(|(_, kind)| *kind == IconKind::Svg)
        .map(|(path, _)| path.clone())
}

fn hint_forms(hint: &str) -> HashSet<String> {
    let hint = hint.trim();
    let base = Path::new(hint)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| hint.to_string());
    let base_stem = Path::new(&base)
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| base.clone());
    [hint.to_string(), base, base_stem].into_iter().collect()
}

fn matches_hint(path: &Path, forms: &HashSet<String>) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy());
    let stem = path.file_stem().map(|n| n.to_string_lossy());
    name.is_some_and(|n| forms.contains(n.as_ref()))
        || stem.is_some_and(|s| forms.contains(s.as_ref()))
}

/// Best icon inside an extracted tree. Tiers, the first non-empty one wins:
/// files named after the hint, the hicolor `apps` directories, the largest
/// PNG anywhere, any SVG.
pub fn find_icon(root: &Path, hint: Option<&str>) -> Option<PathBuf> {
    let all = icon_files(root);

    if let Some(hint) = hint.filter(|h| !h.trim().is_empty()) {
        let forms = hint_forms(hint);
        let matching: Vec<_> = all
            .iter()
            .filter(|(path, _)| matches_hint(path, &forms))
            .cloned()
            .collect();
        if let Some(found) = pick_best(&matching) {
            log::debug!("Icon matched hint '{}': {}", hint, found.display());
            return Some(found);
        }
    }

    let hicolor = root.join(defs::HICOLOR_DIR);
    if hicolor.is_dir() {
        let themed: Vec<_> = all
            .iter()
            .filter(|(path, _)| {
                path.starts_with(&hicolor)
                    && path
                        .parent()
                        .and_then(Path::file_name)
                        .is_some_and(|dir| dir == "apps")
            })
            .cloned()
            .collect();
        let largest_png = pick_best(
            &themed
                .iter()
                .filter(|(_, kind)| *kind == IconKind::Png)
                .cloned()
                .collect::<Vec<_>>(),
        );
        if let Some(found) = largest_png.or_else(|| themed.first().map(|(p, _)| p.clone())) {
            log::debug!("Icon taken from theme directory: {}", found.display());
            return Some(found);
        }
    }

    let pngs: Vec<_> = all
        .iter()
        .filter(|(_, kind)| *kind == IconKind::Png)
        .cloned()
        .collect();
    if let Some(found) = pick_best(&pngs) {
        return Some(found);
    }

    all.into_iter()
        .find(|(_, kind)| *kind == IconKind::Svg)
        .map(|(path, _)| path)
}
