//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione della pipeline.
//!
//! ## Responsabilità:
//! - Definisce `Config` (conversione WebP + riscrittura riferimenti)
//! - Definisce `ManifestConfig` (manifest gallery, dome gallery, thumbnails)
//! - Raggruppa entrambe in `Settings`, caricabile da file JSON
//! - Fornisce validazione dei parametri e valori di default sensati
//!
//! ## Parametri principali (`Config`):
//! - `quality`: Qualità WebP (1-100, default: 80)
//! - `size_tolerance`: Soglia di classificazione (default: 1.1)
//! - `workers`: Numero di worker paralleli (default: 8)
//! - `keep_originals`: Non elimina i sorgenti dopo la conversione (default: false)
//! - `dry_run`: Simulazione senza modifiche (default: false)
//! - `force`: Riconverte anche se esiste già un `.webp` (default: false)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     quality: 85,
//!     workers: 4,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::PipelineError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Strategy used to patch textual references after conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteStrategy {
    /// Two-pass regex inference over every text artifact
    Heuristic,
    /// Exact substring replacement driven by the rename map of the run
    Exact,
}

/// How manifest entry ids are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// `{collection}-{1-based index}`
    Index,
    /// `{collection}-{sha256 prefix of file bytes}`
    ContentHash,
}

/// Configuration for the WebP conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// WebP quality (1-100)
    pub quality: u8,
    /// Transcoded output counts as "converted" when smaller than original * tolerance
    pub size_tolerance: f64,
    /// Number of parallel workers
    pub workers: usize,
    /// Keep source rasters next to their WebP replacement
    pub keep_originals: bool,
    /// Dry run - don't write, delete or rewrite anything
    pub dry_run: bool,
    /// Convert again even when a `.webp` sibling already exists
    pub force: bool,
    /// Extensions (lowercase, no dot) picked up as source rasters
    pub image_extensions: Vec<String>,
    /// Extensions (lowercase, no dot) of text artifacts to patch
    pub text_extensions: Vec<String>,
    /// Directory names that mark a path as an asset path
    pub asset_dir_tokens: Vec<String>,
    pub rewrite_strategy: RewriteStrategy,
    /// Root scanned for text artifacts (None = same as the image root)
    pub text_root: Option<PathBuf>,
    pub follow_links: bool,
    pub max_depth: Option<usize>,
    /// Output progress and summary as JSON lines
    pub json_output: bool,
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quality: 80,
            size_tolerance: 1.1,
            workers: 8,
            keep_originals: false,
            dry_run: false,
            force: false,
            image_extensions: to_strings(&["jpg", "jpeg", "png"]),
            text_extensions: to_strings(&["js", "mjs", "css", "html"]),
            asset_dir_tokens: to_strings(&[
                "images", "assets", "public", "img", "media", "projects", "events", "gallery",
            ]),
            rewrite_strategy: RewriteStrategy::Heuristic,
            text_root: None,
            follow_links: false,
            max_depth: None,
            json_output: false,
            show_progress: true,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.quality == 0 || self.quality > 100 {
            return Err(PipelineError::InvalidConfig("WebP quality must be between 1 and 100".into()));
        }

        if !(self.size_tolerance > 0.0) {
            return Err(PipelineError::InvalidConfig("Size tolerance must be greater than 0".into()));
        }

        if self.workers == 0 {
            return Err(PipelineError::InvalidConfig("Number of workers must be greater than 0".into()));
        }

        if self.image_extensions.is_empty() {
            return Err(PipelineError::InvalidConfig("At least one image extension is required".into()));
        }

        Ok(())
    }
}

/// Display height hints per orientation, in pixels
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayHeights {
    pub horizontal: Vec<u32>,
    pub vertical: Vec<u32>,
    pub square: Vec<u32>,
}

impl Default for DisplayHeights {
    fn default() -> Self {
        Self {
            horizontal: vec![250, 280, 300],
            vertical: vec![400, 450, 500],
            square: vec![300, 320, 350],
        }
    }
}

/// Configuration for manifest and thumbnail generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Root of the public asset tree; URLs are computed relative to it
    pub public_root: PathBuf,
    /// Directory holding one subdirectory per collection (relative to public_root)
    pub collections_dir: PathBuf,
    /// Hand-authored description table (required)
    pub descriptions_file: PathBuf,
    /// Hand-authored collection metadata carrying `coverImage`
    pub metadata_file: Option<PathBuf>,
    pub gallery_output: PathBuf,
    pub dome_output: PathBuf,
    /// Cover values that may be overwritten; the empty string always qualifies
    pub placeholder_covers: Vec<String>,
    pub id_scheme: IdScheme,
    /// Sort enumeration by file name so ids do not depend on the filesystem
    pub stable_order: bool,
    pub display_heights: DisplayHeights,
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    /// Thumbnail directory (relative to public_root)
    pub thumbnail_dir: PathBuf,
    pub thumbnail_max_edge: u32,
    pub thumbnail_quality: u8,
    pub thumbnail_batch_size: usize,
    pub thumbnail_index_output: PathBuf,
    pub force: bool,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            public_root: PathBuf::from("public"),
            collections_dir: PathBuf::from("images/events"),
            descriptions_file: PathBuf::from("src/data/descriptions.json"),
            metadata_file: None,
            gallery_output: PathBuf::from("src/data/gallery.json"),
            dome_output: PathBuf::from("src/data/dome-gallery.json"),
            placeholder_covers: to_strings(&[
                "/placeholder.svg",
                "/placeholder.jpg",
                "/images/placeholder.jpg",
            ]),
            id_scheme: IdScheme::Index,
            stable_order: true,
            display_heights: DisplayHeights::default(),
            image_extensions: to_strings(&["jpg", "jpeg", "png", "webp", "gif", "avif"]),
            video_extensions: to_strings(&["mp4", "webm", "mov"]),
            thumbnail_dir: PathBuf::from("thumbnails"),
            thumbnail_max_edge: 480,
            thumbnail_quality: 75,
            thumbnail_batch_size: 8,
            thumbnail_index_output: PathBuf::from("src/data/thumbnails.json"),
            force: false,
        }
    }
}

impl ManifestConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.thumbnail_quality == 0 || self.thumbnail_quality > 100 {
            return Err(PipelineError::InvalidConfig("Thumbnail quality must be between 1 and 100".into()));
        }

        if self.thumbnail_max_edge == 0 {
            return Err(PipelineError::InvalidConfig("Thumbnail edge must be greater than 0".into()));
        }

        if self.thumbnail_batch_size == 0 {
            return Err(PipelineError::InvalidConfig("Thumbnail batch size must be greater than 0".into()));
        }

        let heights = &self.display_heights;
        if heights.horizontal.is_empty() || heights.vertical.is_empty() || heights.square.is_empty() {
            return Err(PipelineError::InvalidConfig("Every orientation needs at least one display height".into()));
        }

        Ok(())
    }

    /// Directory containing the collection subdirectories
    pub fn collections_root(&self) -> PathBuf {
        self.public_root.join(&self.collections_dir)
    }

    /// Whether a cover value may be replaced by a discovered image
    pub fn is_placeholder_cover(&self, cover: &str) -> bool {
        let cover = cover.trim();
        cover.is_empty() || self.placeholder_covers.iter().any(|p| p == cover)
    }
}

/// Everything a settings file can carry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub convert: Config,
    pub manifest: ManifestConfig,
}

impl Settings {
    /// Load settings from file; a missing file yields defaults
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.convert.validate()?;
        settings.manifest.validate()?;
        Ok(settings)
    }

    /// Save settings to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Default location of the user settings file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("asset-pipeline").join("config.json"))
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
