//! # Conversion Task Module
//!
//! Worker per la conversione di un singolo file sorgente.
//! Separato dall'orchestratore: ogni task possiede esattamente un sorgente e
//! il suo `.webp`, nessuno stato condiviso tra task.

use crate::{
    config::Config,
    error::{FileError, PipelineError},
    pipeline::path_resolver::PathResolver,
    policy::{ConversionPolicy, SizeVerdict, SkipReason},
    transcoder::WebPTranscoder,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-file result of a conversion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub original_bytes: u64,
    pub output_bytes: u64,
    /// The WebP replaced the source (false for skips and failures)
    pub kept: bool,
    pub deleted_source: bool,
    pub verdict: Option<SizeVerdict>,
    pub skipped: Option<SkipReason>,
    pub error: Option<FileError>,
}

/// Coarse view of a result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileOutcome<'a> {
    Converted,
    Skipped(SkipReason),
    Failed(&'a FileError),
}

impl ConversionResult {
    fn new(source_path: &Path, output_path: PathBuf) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            output_path,
            original_bytes: 0,
            output_bytes: 0,
            kept: false,
            deleted_source: false,
            verdict: None,
            skipped: None,
            error: None,
        }
    }

    fn skip(mut self, reason: SkipReason) -> Self {
        self.skipped = Some(reason);
        self
    }

    fn fail(mut self, error: &PipelineError) -> Self {
        self.error = Some(FileError::new(&self.source_path, error));
        self
    }

    /// Result for a source that was never processed
    pub fn rejected(source: &Path, output: PathBuf, error: &PipelineError) -> Self {
        Self::new(source, output).fail(error)
    }

    pub fn outcome(&self) -> FileOutcome<'_> {
        if let Some(ref error) = self.error {
            FileOutcome::Failed(error)
        } else if let Some(reason) = self.skipped {
            FileOutcome::Skipped(reason)
        } else {
            FileOutcome::Converted
        }
    }

    /// The `.webp` sibling exists (or would, in a dry run) after this result
    pub fn has_webp(&self) -> bool {
        matches!(
            self.outcome(),
            FileOutcome::Converted | FileOutcome::Skipped(SkipReason::AlreadyConverted)
        )
    }
}

/// Worker per la conversione di singoli file
#[derive(Clone)]
pub struct ConversionTask {
    config: Arc<Config>,
    transcoder: WebPTranscoder,
    policy: ConversionPolicy,
}

impl ConversionTask {
    pub fn new(config: Arc<Config>) -> Self {
        let transcoder = WebPTranscoder::new(config.quality);
        let policy = ConversionPolicy::new(config.size_tolerance);
        Self {
            config,
            transcoder,
            policy,
        }
    }

    /// Convert one source file; every failure ends up in the result
    pub async fn process(&self, source: PathBuf) -> ConversionResult {
        let output = match PathResolver::webp_path(&source) {
            Ok(output) => output,
            Err(e) => return ConversionResult::new(&source, PathBuf::new()).fail(&e),
        };
        let result = ConversionResult::new(&source, output);

        let original_bytes = match tokio::fs::metadata(&source).await {
            Ok(metadata) => metadata.len(),
            Err(e) => return result.fail(&PipelineError::from(e)),
        };

        if let Some(reason) = self.policy.pre_check(original_bytes) {
            debug!("[SKIP] Empty file: {}", source.display());
            return result.skip(reason);
        }

        if !self.config.force && result.output_path.exists() {
            debug!("[SKIP] Already converted: {}", source.display());
            return ConversionResult {
                original_bytes,
                ..result.skip(SkipReason::AlreadyConverted)
            };
        }

        let converted = self.convert(&source, &result.output_path, original_bytes).await;
        match converted {
            Ok((output_bytes, verdict, deleted_source)) => ConversionResult {
                original_bytes,
                output_bytes,
                kept: true,
                deleted_source,
                verdict: Some(verdict),
                ..result
            },
            Err(e) => ConversionResult {
                original_bytes,
                ..result.fail(&e)
            },
        }
    }

    async fn convert(
        &self,
        source: &Path,
        output: &Path,
        original_bytes: u64,
    ) -> Result<(u64, SizeVerdict, bool), PipelineError> {
        let bytes = tokio::fs::read(source).await?;

        let transcoder = self.transcoder;
        let encoded = tokio::task::spawn_blocking(move || transcoder.transcode(&bytes))
            .await
            .map_err(|e| PipelineError::Encode(format!("transcode task failed: {}", e)))??;

        let output_bytes = encoded.len() as u64;
        let decision = self.policy.decide(original_bytes, output_bytes);
        debug!(
            "{} {} -> {} ({} -> {} bytes)",
            decision.label(),
            source.display(),
            output.display(),
            original_bytes,
            output_bytes
        );

        if self.config.dry_run {
            debug!("Dry run: would write {}", output.display());
            return Ok((output_bytes, decision.verdict, false));
        }

        tokio::fs::write(output, &encoded).await?;

        let mut deleted_source = false;
        if decision.keep_transcoded && !self.config.keep_originals {
            match tokio::fs::remove_file(source).await {
                Ok(()) => deleted_source = true,
                Err(e) => warn!("Could not delete original {}: {}", source.display(), e),
            }
        }

        Ok((output_bytes, decision.verdict, deleted_source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transcoder::test_images::{jpeg_bytes, png_rgba_bytes};
    use tempfile::TempDir;

    fn task(config: Config) -> ConversionTask {
        ConversionTask::new(Arc::new(config))
    }

    #[tokio::test]
    async fn test_converts_and_deletes_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("photo.jpg");
        std::fs::write(&source, jpeg_bytes(64, 48)).unwrap();

        let result = task(Config::default()).process(source.clone()).await;

        assert_eq!(result.outcome(), FileOutcome::Converted);
        assert!(result.kept);
        assert!(result.deleted_source);
        assert!(!source.exists());
        assert_eq!(result.output_path, temp_dir.path().join("photo.webp"));
        assert_eq!(std::fs::metadata(&result.output_path).unwrap().len(), result.output_bytes);
    }

    #[tokio::test]
    async fn test_keep_originals_and_alpha_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("logo.png");
        std::fs::write(&source, png_rgba_bytes(32, 32)).unwrap();

        let config = Config {
            keep_originals: true,
            ..Default::default()
        };
        let result = task(config).process(source.clone()).await;

        assert_eq!(result.outcome(), FileOutcome::Converted);
        assert!(!result.deleted_source);
        assert!(source.exists());
        assert!(result.output_path.exists());
    }

    #[tokio::test]
    async fn test_empty_file_is_skipped_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("empty.jpg");
        std::fs::write(&source, b"").unwrap();

        let result = task(Config::default()).process(source.clone()).await;

        assert_eq!(result.outcome(), FileOutcome::Skipped(SkipReason::Empty));
        assert!(source.exists());
        assert!(!temp_dir.path().join("empty.webp").exists());
    }

    #[tokio::test]
    async fn test_existing_webp_skipped_unless_forced() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.jpg");
        std::fs::write(&source, jpeg_bytes(16, 16)).unwrap();
        std::fs::write(temp_dir.path().join("a.webp"), b"previous").unwrap();

        let result = task(Config::default()).process(source.clone()).await;
        assert_eq!(result.outcome(), FileOutcome::Skipped(SkipReason::AlreadyConverted));
        assert!(result.has_webp());
        assert!(source.exists());

        let forced = task(Config {
            force: true,
            ..Default::default()
        })
        .process(source.clone())
        .await;
        assert_eq!(forced.outcome(), FileOutcome::Converted);
        assert_ne!(std::fs::read(&forced.output_path).unwrap(), b"previous");
    }

    #[tokio::test]
    async fn test_corrupt_source_is_recorded() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("bad.png");
        std::fs::write(&source, b"definitely not a png").unwrap();

        let result = task(Config::default()).process(source.clone()).await;

        match result.outcome() {
            FileOutcome::Failed(err) => assert_eq!(err.kind, ErrorKind::Decode),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(source.exists());
        assert!(!result.has_webp());
        assert!(!temp_dir.path().join("bad.webp").exists());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.jpg");
        std::fs::write(&source, jpeg_bytes(32, 32)).unwrap();

        let config = Config {
            dry_run: true,
            ..Default::default()
        };
        let result = task(config).process(source.clone()).await;

        assert_eq!(result.outcome(), FileOutcome::Converted);
        assert!(result.output_bytes > 0);
        assert!(source.exists());
        assert!(!result.output_path.exists());
    }
}
