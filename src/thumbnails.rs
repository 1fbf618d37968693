//! # Thumbnail Module
//!
//! Genera le anteprime WebP delle immagini di ogni collection e l'indice JSON
//! che le collega alle immagini originali.
//!
//! ## Responsabilità:
//! - Resize con lato lungo al massimo `thumbnail_max_edge` (mai upscaling)
//! - Encoding WebP in-process alla qualità dei thumbnails
//! - Lavoro a batch di `thumbnail_batch_size` file per limitare la memoria
//! - Riuso dei thumbnail già presenti, a meno di `force`
//! - Un solo sorgente per thumbnail: `team.jpg` e `team.png` nella stessa
//!   directory non si sovrascrivono, il secondo finisce tra gli errori
//!
//! ## Struttura Output
//! ```text
//! public/
//! ├── images/events/hackathon/team.jpg
//! └── thumbnails/
//!     └── hackathon/
//!         └── team.webp   (480x320)
//! ```
//!
//! Gli errori sui singoli file vengono registrati e loggati, mai propagati.

use crate::{
    config::ManifestConfig,
    error::{FileError, PipelineError},
    file_manager::{public_url, FileTreeScanner},
    manifest::{orientation::probe_dimensions, write_json_atomic},
    pipeline::path_resolver::{OutputClaims, PathResolver},
    transcoder::{decode, WebPTranscoder},
};
use anyhow::Result;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// One row of the thumbnail index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailEntry {
    /// Public URL of the full-size image
    pub src: String,
    /// Public URL of the thumbnail
    pub thumbnail: String,
    pub width: u32,
    pub height: u32,
}

/// Collection id → thumbnails in enumeration order
pub type ThumbnailIndex = BTreeMap<String, Vec<ThumbnailEntry>>;

/// Result of a thumbnail run
#[derive(Debug, Clone, Default)]
pub struct ThumbnailReport {
    pub index: ThumbnailIndex,
    pub created: usize,
    pub reused: usize,
    pub errors: Vec<FileError>,
}

impl ThumbnailReport {
    pub fn total(&self) -> usize {
        self.created + self.reused + self.errors.len()
    }
}

enum ThumbnailOutcome {
    Created(ThumbnailEntry),
    Reused(ThumbnailEntry),
    Failed(FileError),
}

#[derive(Debug, Clone)]
struct ThumbnailJob {
    collection_id: String,
    source: PathBuf,
    target: PathBuf,
}

pub struct ThumbnailGenerator {
    config: ManifestConfig,
    transcoder: WebPTranscoder,
}

impl ThumbnailGenerator {
    pub fn new(config: ManifestConfig) -> Self {
        let transcoder = WebPTranscoder::new(config.thumbnail_quality);
        Self { config, transcoder }
    }

    /// Directory receiving one subdirectory of thumbnails per collection
    pub fn thumbnail_root(&self) -> PathBuf {
        self.config.public_root.join(&self.config.thumbnail_dir)
    }

    /// Build every thumbnail and write the index file
    pub async fn run(&self) -> Result<ThumbnailReport> {
        self.config.validate()?;

        let collections_root = self.config.collections_root();
        if !collections_root.is_dir() {
            return Err(PipelineError::MissingInput(format!(
                "collections directory {}",
                collections_root.display()
            ))
            .into());
        }

        let (jobs, rejected) = self.collect_jobs(&collections_root).await?;
        info!(
            "Found {} images for thumbnail creation ({} per batch)",
            jobs.len(),
            self.config.thumbnail_batch_size
        );

        let mut report = self.process(jobs).await;
        for err in rejected {
            warn!("Skipping thumbnail for {}: {}", err.path.display(), err.message);
            report.errors.push(err);
        }

        write_json_atomic(&self.config.thumbnail_index_output, &report.index)?;
        info!(
            "Thumbnail creation complete: {} created, {} reused, {} errors",
            report.created,
            report.reused,
            report.errors.len()
        );
        info!("Wrote thumbnail index: {}", self.config.thumbnail_index_output.display());

        Ok(report)
    }

    /// Jobs in collection order, plus the sources whose thumbnail path is already taken
    async fn collect_jobs(
        &self,
        collections_root: &Path,
    ) -> Result<(Vec<ThumbnailJob>, Vec<FileError>), PipelineError> {
        let mut collections = Vec::new();
        let mut dir = tokio::fs::read_dir(collections_root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                collections.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        collections.sort();

        let scanner = FileTreeScanner::new(&self.config.image_extensions).sorted(self.config.stable_order);
        let thumbnail_root = self.thumbnail_root();

        let mut claims = OutputClaims::new();
        let mut jobs = Vec::new();
        let mut rejected = Vec::new();
        for collection_id in collections {
            let collection_dir = collections_root.join(&collection_id);
            for source in scanner.scan(&collection_dir) {
                let Ok(relative) = source.strip_prefix(&collection_dir) else {
                    continue;
                };
                let target = PathResolver::webp_path(&thumbnail_root.join(&collection_id).join(relative))
                    .and_then(|target| claims.claim(&target, &source).map(|()| target));

                match target {
                    Ok(target) => jobs.push(ThumbnailJob {
                        collection_id: collection_id.clone(),
                        source,
                        target,
                    }),
                    Err(e) => rejected.push(FileError::new(&source, &e)),
                }
            }
        }

        Ok((jobs, rejected))
    }

    async fn process(&self, jobs: Vec<ThumbnailJob>) -> ThumbnailReport {
        let mut report = ThumbnailReport::default();

        for batch in jobs.chunks(self.config.thumbnail_batch_size) {
            let tasks: Vec<_> = batch
                .iter()
                .cloned()
                .map(|job| {
                    let transcoder = self.transcoder;
                    let max_edge = self.config.thumbnail_max_edge;
                    let force = self.config.force;
                    let public_root = self.config.public_root.clone();
                    tokio::spawn(async move {
                        let outcome = create_thumbnail(&job, transcoder, max_edge, force, &public_root).await;
                        (job.collection_id, outcome)
                    })
                })
                .collect();

            for joined in futures::future::join_all(tasks).await {
                match joined {
                    Ok((collection_id, outcome)) => record(&mut report, collection_id, outcome),
                    Err(e) => error!("Thumbnail task panicked: {}", e),
                }
            }
            debug!("Thumbnail batch of {} finished", batch.len());
        }

        report
    }
}

fn record(report: &mut ThumbnailReport, collection_id: String, outcome: ThumbnailOutcome) {
    match outcome {
        ThumbnailOutcome::Created(entry) => {
            report.created += 1;
            report.index.entry(collection_id).or_default().push(entry);
        }
        ThumbnailOutcome::Reused(entry) => {
            report.reused += 1;
            report.index.entry(collection_id).or_default().push(entry);
        }
        ThumbnailOutcome::Failed(err) => {
            error!("Failed to create thumbnail for {}: {}", err.path.display(), err.message);
            report.errors.push(err);
        }
    }
}

async fn create_thumbnail(
    job: &ThumbnailJob,
    transcoder: WebPTranscoder,
    max_edge: u32,
    force: bool,
    public_root: &Path,
) -> ThumbnailOutcome {
    let (Some(src), Some(thumbnail)) = (
        public_url(&job.source, public_root),
        public_url(&job.target, public_root),
    ) else {
        return ThumbnailOutcome::Failed(FileError::new(
            &job.source,
            &PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path is outside the public root",
            )),
        ));
    };

    if !force {
        if let Some((width, height)) = existing_dimensions(&job.target).await {
            debug!("Reusing thumbnail: {}", job.target.display());
            return ThumbnailOutcome::Reused(ThumbnailEntry { src, thumbnail, width, height });
        }
    }

    match render(job, transcoder, max_edge).await {
        Ok((width, height)) => {
            debug!("Saved thumbnail: {} ({}x{})", job.target.display(), width, height);
            ThumbnailOutcome::Created(ThumbnailEntry { src, thumbnail, width, height })
        }
        Err(e) => ThumbnailOutcome::Failed(FileError::new(&job.source, &e)),
    }
}

async fn render(job: &ThumbnailJob, transcoder: WebPTranscoder, max_edge: u32) -> Result<(u32, u32), PipelineError> {
    let bytes = tokio::fs::read(&job.source).await?;

    let (encoded, width, height) = tokio::task::spawn_blocking(move || {
        let image = decode(&bytes)?;
        let (w, h) = image.dimensions();
        let resized = if w.max(h) > max_edge {
            image.thumbnail(max_edge, max_edge)
        } else {
            image
        };
        let (width, height) = resized.dimensions();
        Ok::<_, PipelineError>((transcoder.encode(&resized)?, width, height))
    })
    .await
    .map_err(|e| PipelineError::Encode(format!("thumbnail task failed: {}", e)))??;

    if let Some(parent) = job.target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&job.target, encoded).await?;

    Ok((width, height))
}

/// Dimensions of a thumbnail already on disk; unreadable files count as missing
async fn existing_dimensions(path: &Path) -> Option<(u32, u32)> {
    let bytes = tokio::fs::read(path).await.ok()?;
    if let Some(dims) = probe_dimensions(&bytes) {
        return Some(dims);
    }
    match decode(&bytes) {
        Ok(image) => Some(image.dimensions()),
        Err(e) => {
            warn!("Existing thumbnail {} is unreadable, rebuilding: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::test_images::{jpeg_bytes, png_bytes};
    use tempfile::TempDir;

    fn setup() -> (TempDir, ManifestConfig) {
        let temp_dir = TempDir::new().unwrap();
        let public = temp_dir.path().join("public");
        let events = public.join("images/events");

        std::fs::create_dir_all(events.join("hack")).unwrap();
        std::fs::write(events.join("hack/wide.jpg"), jpeg_bytes(960, 480)).unwrap();
        std::fs::write(events.join("hack/small.png"), png_bytes(100, 50)).unwrap();
        std::fs::write(events.join("hack/broken.jpg"), b"nope").unwrap();
        std::fs::write(events.join("hack/clip.mp4"), b"video").unwrap();

        let config = ManifestConfig {
            public_root: public,
            thumbnail_index_output: temp_dir.path().join("data/thumbnails.json"),
            thumbnail_batch_size: 2,
            ..Default::default()
        };
        (temp_dir, config)
    }

    #[tokio::test]
    async fn test_thumbnails_are_bounded_and_indexed() {
        let (_temp_dir, config) = setup();
        let generator = ThumbnailGenerator::new(config.clone());
        let report = generator.run().await.unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].path.ends_with("broken.jpg"));

        let hack = &report.index["hack"];
        assert_eq!(hack.len(), 2);
        let wide = hack.iter().find(|e| e.src.ends_with("wide.jpg")).unwrap();
        assert_eq!((wide.width, wide.height), (480, 240));
        assert_eq!(wide.thumbnail, "/thumbnails/hack/wide.webp");

        // never upscaled
        let small = hack.iter().find(|e| e.src.ends_with("small.png")).unwrap();
        assert_eq!((small.width, small.height), (100, 50));

        assert!(config.public_root.join("thumbnails/hack/wide.webp").exists());
        let written: ThumbnailIndex =
            serde_json::from_str(&std::fs::read_to_string(&config.thumbnail_index_output).unwrap()).unwrap();
        assert_eq!(written["hack"].len(), 2);
    }

    #[tokio::test]
    async fn test_existing_thumbnails_reused_unless_forced() {
        let (_temp_dir, config) = setup();
        ThumbnailGenerator::new(config.clone()).run().await.unwrap();

        let again = ThumbnailGenerator::new(config.clone()).run().await.unwrap();
        assert_eq!(again.created, 0);
        assert_eq!(again.reused, 2);
        assert_eq!(again.total(), 3);

        let forced = ThumbnailGenerator::new(ManifestConfig { force: true, ..config }).run().await.unwrap();
        assert_eq!(forced.created, 2);
        assert_eq!(forced.reused, 0);
    }

    #[tokio::test]
    async fn test_same_stem_images_keep_separate_thumbnails() {
        let (_temp_dir, config) = setup();
        let hack = config.collections_root().join("hack");
        std::fs::write(hack.join("wide.png"), png_bytes(40, 40)).unwrap();
        std::fs::create_dir_all(hack.join("day2")).unwrap();
        std::fs::write(hack.join("day2/wide.jpg"), jpeg_bytes(30, 60)).unwrap();
        std::fs::write(hack.join("archive.v1.jpg"), jpeg_bytes(20, 20)).unwrap();

        let report = ThumbnailGenerator::new(config.clone()).run().await.unwrap();

        assert_eq!(report.created, 4);
        let collision = report.errors.iter().find(|e| e.path.ends_with("wide.png")).unwrap();
        assert!(collision.message.contains("wide.jpg"));

        let thumbnails = config.public_root.join("thumbnails/hack");
        let wide = decode(&std::fs::read(thumbnails.join("wide.webp")).unwrap()).unwrap();
        assert_eq!(wide.dimensions(), (480, 240));
        let nested = decode(&std::fs::read(thumbnails.join("day2/wide.webp")).unwrap()).unwrap();
        assert_eq!(nested.dimensions(), (30, 60));
        assert!(thumbnails.join("archive.v1.webp").exists());
    }

    #[tokio::test]
    async fn test_missing_collections_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let config = ManifestConfig {
            public_root: temp_dir.path().join("public"),
            ..Default::default()
        };
        assert!(ThumbnailGenerator::new(config).run().await.is_err());
    }
}
