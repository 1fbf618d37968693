//! # Manifest Generator
//!
//! Ricostruisce i manifest dall'albero `public/`.
//!
//! ## Flusso:
//! 1. Pre-flight: tabella descrizioni e directory delle collection devono esistere
//! 2. Una collection per sottodirectory (più quelle note solo ai metadati, vuote)
//! 3. Per ogni file media: orientamento dagli header, altezza di layout casuale
//!    dalla tabella dell'orientamento, descrizione dalla tabella
//! 4. Merge delle cover nei metadati scritti a mano (mai sovrascrivere una cover curata)
//! 5. Scrittura di gallery, dome gallery e metadati aggiornati
//!
//! ## Id:
//! - `IdScheme::Index`: `{collection}-{indice 1-based}`, dipende dall'ordine di
//!   enumerazione (stabile solo con `stable_order`)
//! - `IdScheme::ContentHash`: `{collection}-{sha256 dei bytes, 12 hex}`
//!
//! L'altezza di layout non è deterministica tra run diverse: il generatore riceve
//! un `Rng` esterno, i test ne usano uno con seed fisso.

use crate::{
    config::{IdScheme, ManifestConfig},
    error::PipelineError,
    file_manager::{extension_lowercase, public_url, FileTreeScanner},
    manifest::{
        descriptions::DescriptionTable,
        metadata::{load_records, merge_cover_images, CollectionRecord},
        orientation::Orientation,
        project_dome, write_json_atomic, DomeGalleryItem, GalleryManifest, GalleryManifestEntry,
        MediaType,
    },
};
use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Everything one generation run produces
#[derive(Debug, Clone)]
pub struct ManifestOutput {
    pub gallery: GalleryManifest,
    pub dome: Vec<DomeGalleryItem>,
    /// Metadata records after the cover merge (None when no metadata file is configured)
    pub records: Option<Vec<CollectionRecord>>,
    pub covers_updated: usize,
}

impl ManifestOutput {
    pub fn entry_count(&self) -> usize {
        self.gallery.values().map(Vec::len).sum()
    }
}

pub struct ManifestGenerator {
    config: ManifestConfig,
}

impl ManifestGenerator {
    pub fn new(config: ManifestConfig) -> Self {
        Self { config }
    }

    /// Load inputs, generate, and write every manifest to disk
    pub async fn run<R: Rng>(&self, rng: &mut R) -> Result<ManifestOutput> {
        self.config.validate()?;

        let collections_root = self.config.collections_root();
        if !collections_root.is_dir() {
            return Err(PipelineError::MissingInput(format!(
                "collections directory {}",
                collections_root.display()
            ))
            .into());
        }

        let descriptions = DescriptionTable::load(&self.config.descriptions_file).await?;
        let existing = match self.config.metadata_file {
            Some(ref path) => Some(load_records(path).await?),
            None => None,
        };

        info!("Generating manifests from: {}", collections_root.display());
        let output = self.generate(&descriptions, existing, rng).await?;

        write_json_atomic(&self.config.gallery_output, &output.gallery)?;
        info!("Wrote gallery manifest: {}", self.config.gallery_output.display());

        write_json_atomic(&self.config.dome_output, &output.dome)?;
        info!("Wrote dome gallery: {}", self.config.dome_output.display());

        if let (Some(path), Some(records)) = (&self.config.metadata_file, &output.records) {
            if output.covers_updated > 0 {
                write_json_atomic(path, records)?;
                info!("Updated {} cover image(s) in {}", output.covers_updated, path.display());
            } else {
                debug!("No cover changes, leaving {} untouched", path.display());
            }
        }

        info!(
            "Manifest complete: {} collections, {} entries, {} dome items",
            output.gallery.len(),
            output.entry_count(),
            output.dome.len()
        );

        Ok(output)
    }

    /// Build the manifests from the current asset tree without writing anything
    pub async fn generate<R: Rng>(
        &self,
        descriptions: &DescriptionTable,
        existing: Option<Vec<CollectionRecord>>,
        rng: &mut R,
    ) -> Result<ManifestOutput, PipelineError> {
        let collections_root = self.config.collections_root();
        let ids = self.collection_ids(&collections_root, existing.as_deref()).await?;

        let mut gallery = GalleryManifest::new();
        for id in ids {
            let title = existing
                .as_deref()
                .and_then(|records| records.iter().find(|r| r.id == id))
                .and_then(|r| r.title.clone())
                .unwrap_or_else(|| id.clone());

            let entries = self
                .collection_entries(&collections_root.join(&id), &id, &title, descriptions, rng)
                .await;
            debug!("Collection {}: {} entries", id, entries.len());
            gallery.insert(id, entries);
        }

        let mut records = existing;
        let covers_updated = match records.as_mut() {
            Some(records) => merge_cover_images(records, &gallery, &self.config),
            None => 0,
        };

        let dome = project_dome(&gallery);

        Ok(ManifestOutput {
            gallery,
            dome,
            records,
            covers_updated,
        })
    }

    /// Subdirectory names plus ids only known to the metadata
    async fn collection_ids(
        &self,
        root: &Path,
        existing: Option<&[CollectionRecord]>,
    ) -> Result<Vec<String>, PipelineError> {
        let mut on_disk = Vec::new();
        if root.is_dir() {
            let mut dir = tokio::fs::read_dir(root).await?;
            while let Some(entry) = dir.next_entry().await? {
                if entry.file_type().await?.is_dir() {
                    on_disk.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        if self.config.stable_order {
            on_disk.sort();
        }

        let mut seen: BTreeSet<String> = on_disk.iter().cloned().collect();
        let mut ids = on_disk;
        for record in existing.unwrap_or_default() {
            if seen.insert(record.id.clone()) {
                debug!("Collection {} has no directory, it will be empty", record.id);
                ids.push(record.id.clone());
            }
        }

        Ok(ids)
    }

    async fn collection_entries<R: Rng>(
        &self,
        dir: &Path,
        collection_id: &str,
        title: &str,
        descriptions: &DescriptionTable,
        rng: &mut R,
    ) -> Vec<GalleryManifestEntry> {
        let extensions = self
            .config
            .image_extensions
            .iter()
            .chain(self.config.video_extensions.iter());
        let files = FileTreeScanner::new(extensions)
            .sorted(self.config.stable_order)
            .scan(dir);

        let mut entries = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            entries.push(
                self.build_entry(path, index, collection_id, title, descriptions, rng)
                    .await,
            );
        }
        entries
    }

    async fn build_entry<R: Rng>(
        &self,
        path: &Path,
        index: usize,
        collection_id: &str,
        title: &str,
        descriptions: &DescriptionTable,
        rng: &mut R,
    ) -> GalleryManifestEntry {
        let media_type = self.media_type(path);
        let needs_bytes = media_type == MediaType::Image || self.config.id_scheme == IdScheme::ContentHash;

        let bytes = if needs_bytes {
            match tokio::fs::read(path).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Could not read {}: {}", path.display(), e);
                    None
                }
            }
        } else {
            None
        };

        let orientation = match (media_type, &bytes) {
            (MediaType::Image, Some(bytes)) => Orientation::from_header(bytes),
            _ => Orientation::Horizontal,
        };

        let id = match (self.config.id_scheme, &bytes) {
            (IdScheme::ContentHash, Some(bytes)) => {
                let digest = hex::encode(Sha256::digest(bytes));
                format!("{}-{}", collection_id, &digest[..12])
            }
            _ => format!("{}-{}", collection_id, index + 1),
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let image_path = public_url(path, &self.config.public_root)
            .unwrap_or_else(|| format!("/{}", file_name));

        GalleryManifestEntry {
            id,
            image_path,
            media_type,
            title: title.to_string(),
            description: descriptions.lookup(collection_id, &file_name),
            display_height: self.display_height(orientation, rng),
            orientation,
        }
    }

    fn media_type(&self, path: &Path) -> MediaType {
        let is_video = extension_lowercase(path)
            .map(|ext| self.config.video_extensions.iter().any(|v| v.eq_ignore_ascii_case(&ext)))
            .unwrap_or(false);
        if is_video {
            MediaType::Video
        } else {
            MediaType::Image
        }
    }

    fn display_height<R: Rng>(&self, orientation: Orientation, rng: &mut R) -> u32 {
        let heights = &self.config.display_heights;
        let table = match orientation {
            Orientation::Horizontal => &heights.horizontal,
            Orientation::Vertical => &heights.vertical,
            Orientation::Square => &heights.square,
        };
        table.choose(rng).copied().unwrap_or(300)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::test_images::{jpeg_bytes, png_bytes};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Site {
        _temp: TempDir,
        config: ManifestConfig,
    }

    fn site() -> Site {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let events = root.join("public/images/events");

        std::fs::create_dir_all(events.join("hack")).unwrap();
        std::fs::write(events.join("hack/a-wide.jpg"), jpeg_bytes(90, 30)).unwrap();
        std::fs::write(events.join("hack/b-tall.png"), png_bytes(30, 90)).unwrap();
        std::fs::write(events.join("hack/c-clip.mp4"), b"not really a video").unwrap();
        std::fs::write(events.join("hack/notes.txt"), b"ignored").unwrap();

        std::fs::create_dir_all(events.join("meetup")).unwrap();
        std::fs::write(events.join("meetup/cover.jpg"), jpeg_bytes(50, 50)).unwrap();
        std::fs::write(events.join("meetup/broken.jpg"), b"garbage").unwrap();

        std::fs::create_dir_all(root.join("data")).unwrap();
        std::fs::write(
            root.join("data/descriptions.json"),
            r#"{ "hack": { "default": "Hack night", "a-wide.jpg": "Opening talk" } }"#,
        )
        .unwrap();
        std::fs::write(
            root.join("data/events.json"),
            r#"[
                { "id": "hack", "title": "Hackathon", "coverImage": "/images/events/hack/real.jpg" },
                { "id": "meetup", "title": "Meetup", "coverImage": "" },
                { "id": "ghost", "coverImage": "/placeholder.svg" }
            ]"#,
        )
        .unwrap();

        let config = ManifestConfig {
            public_root: root.join("public"),
            collections_dir: PathBuf::from("images/events"),
            descriptions_file: root.join("data/descriptions.json"),
            metadata_file: Some(root.join("data/events.json")),
            gallery_output: root.join("data/gallery.json"),
            dome_output: root.join("data/dome.json"),
            ..Default::default()
        };

        Site { _temp: temp, config }
    }

    #[tokio::test]
    async fn test_run_builds_all_manifests() {
        let site = site();
        let generator = ManifestGenerator::new(site.config.clone());
        let output = generator.run(&mut StdRng::seed_from_u64(7)).await.unwrap();

        let hack = &output.gallery["hack"];
        assert_eq!(hack.len(), 3);
        assert_eq!(hack[0].id, "hack-1");
        assert_eq!(hack[0].image_path, "/images/events/hack/a-wide.jpg");
        assert_eq!(hack[0].orientation, Orientation::Horizontal);
        assert_eq!(hack[0].description, "Opening talk");
        assert_eq!(hack[0].title, "Hackathon");
        assert_eq!(hack[1].orientation, Orientation::Vertical);
        assert_eq!(hack[1].description, "Hack night");
        assert_eq!(hack[2].media_type, MediaType::Video);
        assert_eq!(hack[2].orientation, Orientation::Horizontal);

        let meetup = &output.gallery["meetup"];
        assert_eq!(meetup.len(), 2);
        // broken header falls back to horizontal
        assert_eq!(meetup[0].file_name(), "broken.jpg");
        assert_eq!(meetup[0].orientation, Orientation::Horizontal);
        assert_eq!(meetup[0].description, "");

        assert!(output.gallery["ghost"].is_empty());

        let heights = &site.config.display_heights;
        assert!(heights.vertical.contains(&hack[1].display_height));
        assert!(heights.square.contains(&meetup[1].display_height));

        let written: GalleryManifest =
            serde_json::from_str(&std::fs::read_to_string(&site.config.gallery_output).unwrap()).unwrap();
        assert_eq!(written, output.gallery);

        let dome: Vec<DomeGalleryItem> =
            serde_json::from_str(&std::fs::read_to_string(&site.config.dome_output).unwrap()).unwrap();
        assert_eq!(dome.len(), 2);
        assert_eq!(dome[1].src, "/images/events/meetup/cover.jpg");
    }

    #[tokio::test]
    async fn test_run_never_clobbers_curated_cover() {
        let site = site();
        let generator = ManifestGenerator::new(site.config.clone());
        let output = generator.run(&mut StdRng::seed_from_u64(1)).await.unwrap();
        assert_eq!(output.covers_updated, 1);

        let metadata_path = site.config.metadata_file.clone().unwrap();
        let records: Vec<CollectionRecord> =
            serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();

        assert_eq!(records[0].cover_image.as_deref(), Some("/images/events/hack/real.jpg"));
        // first discovered image in enumeration order
        assert_eq!(records[1].cover_image.as_deref(), Some("/images/events/meetup/broken.jpg"));
        assert_eq!(records[2].cover_image.as_deref(), Some("/placeholder.svg"));

        // a second run with a different tree still keeps the curated cover
        let events = site.config.collections_root();
        std::fs::write(events.join("hack/zzz-new.jpg"), jpeg_bytes(10, 10)).unwrap();
        let again = generator.run(&mut StdRng::seed_from_u64(2)).await.unwrap();
        assert_eq!(again.covers_updated, 0);
        let records = again.records.unwrap();
        assert_eq!(records[0].cover_image.as_deref(), Some("/images/events/hack/real.jpg"));
    }

    #[tokio::test]
    async fn test_content_hash_ids_are_order_independent() {
        let site = site();
        let config = ManifestConfig {
            id_scheme: IdScheme::ContentHash,
            ..site.config.clone()
        };
        let generator = ManifestGenerator::new(config);
        let descriptions = DescriptionTable::default();

        let first = generator.generate(&descriptions, None, &mut StdRng::seed_from_u64(3)).await.unwrap();
        let second = generator.generate(&descriptions, None, &mut StdRng::seed_from_u64(4)).await.unwrap();

        let ids = |out: &ManifestOutput| -> Vec<String> {
            out.gallery["hack"].iter().map(|e| e.id.clone()).collect()
        };
        assert_eq!(ids(&first), ids(&second));
        assert!(ids(&first).iter().all(|id| id.starts_with("hack-") && id.len() == "hack-".len() + 12));
    }

    #[tokio::test]
    async fn test_missing_descriptions_is_fatal() {
        let site = site();
        let config = ManifestConfig {
            descriptions_file: site.config.public_root.join("nope.json"),
            ..site.config.clone()
        };
        let err = ManifestGenerator::new(config)
            .run(&mut StdRng::seed_from_u64(0))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingInput(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_collections_root_is_fatal() {
        let site = site();
        let config = ManifestConfig {
            collections_dir: PathBuf::from("images/nothing-here"),
            ..site.config.clone()
        };
        let result = ManifestGenerator::new(config).run(&mut StdRng::seed_from_u64(0)).await;
        assert!(result.is_err());
    }
}
