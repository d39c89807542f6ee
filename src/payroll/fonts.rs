//! Typeface registration for statement rendering.
//!
//! Statements contain CJK text, so a typeface covering that script must be
//! reachable by the typesetter. The chain is: the preferred family found in a
//! local font directory, then the packaged fallback directory. Nothing here
//! fails; callers check `has_cjk_typeface` and report when neither link of
//! the chain is present.

use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Family expected in the packaged fallback directory.
pub const FALLBACK_FAMILY: &str = "Noto Sans SC";

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc", "otc"];
const MAX_SCAN_DEPTH: usize = 4;

/// Font families and directories handed to the typesetter.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    families: Vec<String>,
    font_dirs: Vec<PathBuf>,
    preferred_found: bool,
    bundled_fallback: bool,
}

impl FontRegistry {
    /// Resolve the fallback chain against the platform font directories.
    pub fn discover(preferred_family: &str, bundled_dir: &Path) -> Self {
        Self::discover_in(preferred_family, bundled_dir, &system_font_dirs())
    }

    /// Resolve the fallback chain against explicit search directories.
    pub fn discover_in(preferred_family: &str, bundled_dir: &Path, search_dirs: &[PathBuf]) -> Self {
        let mut registry = Self::default();
        let preferred = preferred_family.trim();

        if !preferred.is_empty() {
            registry.families.push(preferred.to_string());
            match search_dirs
                .iter()
                .find_map(|dir| find_font_file(dir, &family_key(preferred), 0))
            {
                Some(file) => {
                    info!("Using typeface '{}' from {}", preferred, file.display());
                    registry.preferred_found = true;
                    if let Some(parent) = file.parent() {
                        registry.add_dir(parent.to_path_buf());
                    }
                }
                None => warn!(
                    "Typeface '{}' not found locally, relying on packaged fallback",
                    preferred
                ),
            }
        }

        if !registry.families.iter().any(|f| f == FALLBACK_FAMILY) {
            registry.families.push(FALLBACK_FAMILY.to_string());
        }

        if contains_font_files(bundled_dir) {
            registry.bundled_fallback = true;
            registry.add_dir(bundled_dir.to_path_buf());
        } else {
            warn!(
                "Packaged font directory {} has no font files",
                bundled_dir.display()
            );
        }

        registry
    }

    /// Families in preference order.
    pub fn families(&self) -> &[String] {
        &self.families
    }

    /// True when either the preferred family or the packaged fallback was found.
    pub fn has_cjk_typeface(&self) -> bool {
        self.preferred_found || self.bundled_fallback
    }

    /// Extra directories passed to the typesetter as `--font-path`.
    pub fn font_dirs(&self) -> &[PathBuf] {
        &self.font_dirs
    }

    fn add_dir(&mut self, dir: PathBuf) {
        if !self.font_dirs.contains(&dir) {
            self.font_dirs.push(dir);
        }
    }
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from("C:\\Windows\\Fonts"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    dirs
}

/// Lowercased family name without separators, e.g. `notosanscjksc`.
fn family_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn find_font_file(dir: &Path, key: &str, depth: usize) -> Option<PathBuf> {
    if depth > MAX_SCAN_DEPTH || key.is_empty() {
        return None;
    }
    let entries = fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if is_font_file(&path) {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(family_key)
                .unwrap_or_default();
            if stem.contains(key) {
                return Some(path);
            }
        }
    }
    subdirs
        .iter()
        .find_map(|sub| find_font_file(sub, key, depth + 1))
}

fn contains_font_files(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| entries.flatten().any(|e| is_font_file(&e.path())))
        .unwrap_or(false)
}
