//! # Reference Rewriter Module
//!
//! Riscrive nei file di build (JS/CSS/HTML) i riferimenti agli asset convertiti.
//!
//! ## Strategia euristica (default), due passate in sequenza:
//! 1. **Strutturale**: path che contengono un token di directory asset noto
//!    (`images`, `assets`, `public`, ...) seguiti da `.jpg`/`.jpeg`/`.png`
//! 2. **Stringhe quotate**: qualunque stringa tra apici che termina con una delle
//!    estensioni, riscritta solo se il prefisso "sembra" un path immagine
//!    (contiene `images`, `assets`, `/img`, `./` oppure `/`)
//!
//! La seconda passata lavora sul contenuto già aggiornato dalla prima.
//! È un'euristica best-effort, non un parser: `"version.png"` non viene toccato.
//!
//! ## Strategia esatta:
//! - `RenameMap` costruita durante la conversione (vecchio path → nuovo path)
//! - Sostituzione esatta di sottostringhe, nessuna inferenza
//!
//! Entrambe le strategie sono idempotenti: la seconda esecuzione non cambia nulla.

use crate::error::{FileError, PipelineError};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of patching one text artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRewriteResult {
    pub file_path: PathBuf,
    pub changed: bool,
    pub error: Option<FileError>,
}

/// Two-pass regex rewriter for renamed raster references
#[derive(Debug, Clone)]
pub struct ReferenceRewriter {
    structural: Regex,
    quoted: Regex,
}

impl ReferenceRewriter {
    /// Build the rewriter for the given renamed extensions and asset directory tokens
    pub fn new<E, T>(renamed_extensions: &[E], dir_tokens: &[T]) -> Result<Self, PipelineError>
    where
        E: AsRef<str>,
        T: AsRef<str>,
    {
        let extensions = alternation(renamed_extensions.iter().map(|e| e.as_ref().trim_start_matches('.')));
        let tokens = alternation(dir_tokens.iter().map(|t| t.as_ref().trim_matches('/')));

        if extensions.is_empty() || tokens.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "rewriter needs at least one extension and one directory token".into(),
            ));
        }

        // The extension must end the path: `images/a.png.map` is left alone
        let structural = Regex::new(&format!(
            r#"(?i)\b((?:{tokens})/[^"'`\s()<>,;]*?)\.(?:{extensions})(?P<tail>$|[^\w.]|\.(?:$|\W))"#
        ))
        .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        let quoted = Regex::new(&format!(
            r#"(?i)"([^"\r\n]*)\.(?:{extensions})"|'([^'\r\n]*)\.(?:{extensions})'|`([^`\r\n]*)\.(?:{extensions})`"#
        ))
        .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        Ok(Self { structural, quoted })
    }

    /// Rewrite references in `content`; returns the new content and whether it changed
    pub fn rewrite(&self, content: &str) -> (String, bool) {
        let after_structural = self.structural.replace_all(content, "${1}.webp${tail}");

        let after_quoted = self
            .quoted
            .replace_all(&after_structural, |caps: &Captures<'_>| rewrite_quoted(caps))
            .into_owned();

        let changed = after_quoted != content;
        (after_quoted, changed)
    }
}

fn rewrite_quoted(caps: &Captures<'_>) -> String {
    const QUOTES: [char; 3] = ['"', '\'', '`'];

    for (group, quote) in QUOTES.iter().enumerate() {
        if let Some(prefix) = caps.get(group + 1) {
            let prefix = prefix.as_str();
            if looks_like_image_path(prefix) {
                return format!("{quote}{prefix}.webp{quote}");
            }
            break;
        }
    }
    caps[0].to_string()
}

/// Heuristic test applied to the part of a quoted string before the extension
pub fn looks_like_image_path(prefix: &str) -> bool {
    let lower = prefix.to_lowercase();
    ["images", "assets", "/img", "./", "/"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Alternation of escaped literals, longest first
fn alternation<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let mut items: Vec<&str> = items.filter(|s| !s.is_empty()).collect();
    items.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    items.dedup();
    items.iter().map(|s| regex::escape(s)).collect::<Vec<_>>().join("|")
}

/// Old → new asset paths recorded while converting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenameMap {
    entries: Vec<(String, String)>,
}

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: impl Into<String>, new: impl Into<String>) {
        let old = old.into();
        if !self.entries.iter().any(|(o, _)| *o == old) {
            self.entries.push((old, new.into()));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact substring replacement, longest old path first
    pub fn rewrite(&self, content: &str) -> (String, bool) {
        let mut ordered: Vec<&(String, String)> = self.entries.iter().collect();
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut updated = content.to_string();
        for (old, new) in ordered {
            if updated.contains(old.as_str()) {
                updated = updated.replace(old.as_str(), new);
            }
        }

        let changed = updated != content;
        (updated, changed)
    }
}

/// The rewriting rules selected for a run
#[derive(Debug, Clone)]
pub enum RewriteRules {
    Heuristic(ReferenceRewriter),
    Exact(RenameMap),
}

impl RewriteRules {
    pub fn apply(&self, content: &str) -> (String, bool) {
        match self {
            RewriteRules::Heuristic(rewriter) => rewriter.rewrite(content),
            RewriteRules::Exact(map) => map.rewrite(content),
        }
    }

    /// Patch one file in place; failures are reported, never raised
    pub async fn rewrite_file(&self, path: &Path, dry_run: bool) -> ReferenceRewriteResult {
        match self.try_rewrite_file(path, dry_run).await {
            Ok(changed) => ReferenceRewriteResult {
                file_path: path.to_path_buf(),
                changed,
                error: None,
            },
            Err(e) => ReferenceRewriteResult {
                file_path: path.to_path_buf(),
                changed: false,
                error: Some(FileError::new(path, &e)),
            },
        }
    }

    async fn try_rewrite_file(&self, path: &Path, dry_run: bool) -> Result<bool, PipelineError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| PipelineError::Rewrite {
            path: path.to_path_buf(),
            message: format!("read failed: {}", e),
        })?;

        let content = String::from_utf8(bytes).map_err(|_| PipelineError::Rewrite {
            path: path.to_path_buf(),
            message: "file is not valid UTF-8".into(),
        })?;

        let (updated, changed) = self.apply(&content);
        if !changed {
            return Ok(false);
        }

        if dry_run {
            debug!("Dry run: would update references in {}", path.display());
            return Ok(true);
        }

        tokio::fs::write(path, updated).await.map_err(|e| PipelineError::Rewrite {
            path: path.to_path_buf(),
            message: format!("write failed: {}", e),
        })?;
        debug!("Updated references in {}", path.display());
        Ok(true)
    }
}
