//! Hand-authored collection metadata (events, projects).
//!
//! Only `coverImage` is ever written back, and only when it is empty or a
//! known placeholder. Every other field round-trips untouched.

use crate::config::ManifestConfig;
use crate::error::PipelineError;
use crate::manifest::{GalleryManifest, MediaType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

/// One curated collection record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CollectionRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            cover_image: None,
            extra: Map::new(),
        }
    }
}

pub async fn load_records(path: &Path) -> Result<Vec<CollectionRecord>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(format!(
            "collection metadata {}",
            path.display()
        )));
    }
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Fill empty or placeholder covers with the first discovered image.
/// Deliberately set covers are never replaced. Returns the number of records changed.
pub fn merge_cover_images(
    records: &mut [CollectionRecord],
    gallery: &GalleryManifest,
    config: &ManifestConfig,
) -> usize {
    let mut updated = 0;

    for record in records.iter_mut() {
        let current = record.cover_image.as_deref().unwrap_or("");
        if !config.is_placeholder_cover(current) {
            debug!("Keeping curated cover for {}: {}", record.id, current);
            continue;
        }

        let first_image = gallery
            .get(&record.id)
            .and_then(|entries| entries.iter().find(|e| e.media_type == MediaType::Image));

        if let Some(entry) = first_image {
            if current != entry.image_path {
                info!("Setting cover for {}: {}", record.id, entry.image_path);
                record.cover_image = Some(entry.image_path.clone());
                updated += 1;
            }
        }
    }

    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{GalleryManifestEntry, Orientation};

    fn entry(collection: &str, file: &str, media_type: MediaType) -> GalleryManifestEntry {
        GalleryManifestEntry {
            id: format!("{}-1", collection),
            image_path: format!("/images/{}/{}", collection, file),
            media_type,
            title: collection.to_string(),
            description: String::new(),
            display_height: 300,
            orientation: Orientation::Horizontal,
        }
    }

    fn gallery() -> GalleryManifest {
        let mut gallery = GalleryManifest::new();
        gallery.insert(
            "x".into(),
            vec![entry("x", "intro.mp4", MediaType::Video), entry("x", "new.webp", MediaType::Image)],
        );
        gallery
    }

    fn record(id: &str, cover: Option<&str>) -> CollectionRecord {
        CollectionRecord {
            cover_image: cover.map(str::to_string),
            ..CollectionRecord::new(id)
        }
    }

    #[test]
    fn test_curated_cover_never_clobbered() {
        let mut records = vec![record("x", Some("/images/x/real.jpg"))];
        let updated = merge_cover_images(&mut records, &gallery(), &ManifestConfig::default());
        assert_eq!(updated, 0);
        assert_eq!(records[0].cover_image.as_deref(), Some("/images/x/real.jpg"));
    }

    #[test]
    fn test_empty_cover_gets_first_image() {
        let mut records = vec![record("x", Some(""))];
        let updated = merge_cover_images(&mut records, &gallery(), &ManifestConfig::default());
        assert_eq!(updated, 1);
        assert_eq!(records[0].cover_image.as_deref(), Some("/images/x/new.webp"));
    }

    #[test]
    fn test_placeholder_and_missing_covers_are_filled() {
        let mut records = vec![record("x", Some("/placeholder.svg"))];
        merge_cover_images(&mut records, &gallery(), &ManifestConfig::default());
        assert_eq!(records[0].cover_image.as_deref(), Some("/images/x/new.webp"));

        let mut records = vec![record("x", None)];
        merge_cover_images(&mut records, &gallery(), &ManifestConfig::default());
        assert_eq!(records[0].cover_image.as_deref(), Some("/images/x/new.webp"));
    }

    #[test]
    fn test_collection_without_images_left_alone() {
        let mut records = vec![record("ghost", Some(""))];
        let updated = merge_cover_images(&mut records, &gallery(), &ManifestConfig::default());
        assert_eq!(updated, 0);
        assert_eq!(records[0].cover_image.as_deref(), Some(""));
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let json = r#"[{"id":"x","title":"X","coverImage":"","date":"2024-05-01","tags":["a"]}]"#;
        let mut records: Vec<CollectionRecord> = serde_json::from_str(json).unwrap();
        merge_cover_images(&mut records, &gallery(), &ManifestConfig::default());

        let value = serde_json::to_value(&records).unwrap();
        assert_eq!(value[0]["date"], "2024-05-01");
        assert_eq!(value[0]["tags"][0], "a");
        assert_eq!(value[0]["coverImage"], "/images/x/new.webp");
    }
}
