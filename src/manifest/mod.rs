//! # Manifest Module
//!
//! Rigenera i manifest JSON letti dal sito a runtime partendo dallo stato
//! corrente dell'albero asset.
//!
//! - `orientation`: dimensioni dagli header JPEG/PNG, senza decode completo
//! - `descriptions`: tabella descrizioni scritta a mano (collection → file → testo)
//! - `metadata`: metadati delle collection e regola "non sovrascrivere la cover"
//! - `generator`: costruzione di gallery, dome gallery e scrittura su disco

pub mod descriptions;
pub mod generator;
pub mod metadata;
pub mod orientation;

pub use descriptions::DescriptionTable;
pub use generator::{ManifestGenerator, ManifestOutput};
pub use metadata::CollectionRecord;
pub use orientation::Orientation;

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Kind of media behind a manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// One media file of a collection, as rendered by the gallery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryManifestEntry {
    pub id: String,
    pub image_path: String,
    pub media_type: MediaType,
    pub title: String,
    pub description: String,
    pub display_height: u32,
    pub orientation: Orientation,
}

impl GalleryManifestEntry {
    /// Last segment of the public path
    pub fn file_name(&self) -> &str {
        self.image_path.rsplit('/').next().unwrap_or(&self.image_path)
    }
}

/// Collection id → ordered entries
pub type GalleryManifest = BTreeMap<String, Vec<GalleryManifestEntry>>;

/// Single representative image of a collection for the preview mosaic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomeGalleryItem {
    pub collection_id: String,
    pub src: String,
    pub alt: String,
}

/// One item per collection with at least one image, preferring a "cover" file
pub fn project_dome(gallery: &GalleryManifest) -> Vec<DomeGalleryItem> {
    gallery
        .iter()
        .filter_map(|(collection_id, entries)| {
            let images: Vec<&GalleryManifestEntry> = entries
                .iter()
                .filter(|e| e.media_type == MediaType::Image)
                .collect();

            let chosen = images
                .iter()
                .find(|e| e.file_name().to_lowercase().contains("cover"))
                .or_else(|| images.first())?;

            Some(DomeGalleryItem {
                collection_id: collection_id.clone(),
                src: chosen.image_path.clone(),
                alt: chosen.title.clone(),
            })
        })
        .collect()
}

/// Write pretty-printed JSON through a temp file in the target directory
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.persist(path).map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}
