//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file e le piccole utilità sui file.
//!
//! ## Responsabilità:
//! - `FileTreeScanner`: enumerazione ricorsiva filtrata per estensione
//! - Conversione path → URL pubblico (`/images/...`)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Garanzie dello scanner:
//! - Una root inesistente restituisce una lista vuota, non un errore
//! - Solo file regolari, confronto estensioni case-insensitive
//! - I symlink non vengono seguiti di default; se abilitati, `walkdir`
//!   rileva i cicli e la profondità può essere limitata con `max_depth`
//!
//! ## Esempio:
//! ```rust,ignore
//! let scanner = FileTreeScanner::new(["jpg", "png"]);
//! let files = scanner.scan(Path::new("dist"));
//! ```

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Recursive, extension-filtered file enumeration
#[derive(Debug, Clone)]
pub struct FileTreeScanner {
    extensions: HashSet<String>,
    follow_links: bool,
    max_depth: Option<usize>,
    sort_by_name: bool,
}

impl FileTreeScanner {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            follow_links: false,
            max_depth: None,
            sort_by_name: false,
        }
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Enumerate siblings in file-name order instead of filesystem order
    pub fn sorted(mut self, sorted: bool) -> Self {
        self.sort_by_name = sorted;
        self
    }

    /// Find every regular file under `root` whose extension is in the set
    pub fn scan(&self, root: &Path) -> Vec<PathBuf> {
        if !root.exists() {
            debug!("Scan root does not exist, nothing to do: {}", root.display());
            return Vec::new();
        }

        let mut walker = WalkDir::new(root).follow_links(self.follow_links);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }
        if self.sort_by_name {
            walker = walker.sort_by_file_name();
        }

        walker
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    // loop detection and permission errors end up here
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.matches(path))
            .collect()
    }

    /// Check whether a path carries one of the scanned extensions
    pub fn matches(&self, path: &Path) -> bool {
        extension_lowercase(path)
            .map(|ext| self.extensions.contains(&ext))
            .unwrap_or(false)
    }
}

/// Lowercased extension of a path, if any
pub fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

/// `/`-separated path of `path` relative to `base`, if it lives under it
pub fn relative_slash_path(path: &Path, base: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}

/// Public URL of a file under the web root (`/images/x/a.jpg`)
pub fn public_url(path: &Path, public_root: &Path) -> Option<String> {
    relative_slash_path(path, public_root).map(|rel| format!("/{}", rel))
}

/// Get human-readable file size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Calculate percentage reduction
pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
    if original_size == 0 {
        0.0
    } else {
        ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
    }
}
