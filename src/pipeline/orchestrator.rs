//! # Pipeline Orchestrator
//!
//! Orchestratore della conversione: delega ai moduli specializzati e aggrega
//! il risultato della run.
//!
//! ## Sequenza:
//! 1. Validazione della configurazione e pre-flight sulla root
//! 2. Scan delle immagini sorgente
//! 3. Conversione concorrente (semaforo da `workers` permessi, un task per file);
//!    un sorgente il cui `.webp` è già reclamato da un altro viene registrato come errore
//! 4. Scan degli artefatti testuali e riscrittura dei riferimenti
//! 5. Riepilogo: sempre emesso, anche con errori sui singoli file
//!
//! La riscrittura parte solo se almeno un `.webp` esiste dopo la conversione:
//! altrimenti i riferimenti punterebbero a file inesistenti.

use crate::{
    config::{Config, RewriteStrategy},
    error::{FileError, PipelineError},
    file_manager::{format_size, FileTreeScanner},
    json_output::JsonMessage,
    pipeline::{
        path_resolver::{OutputClaims, PathResolver},
        progress_tracker::ProgressTracker,
        task::{ConversionResult, ConversionTask, FileOutcome},
    },
    rewriter::{ReferenceRewriteResult, ReferenceRewriter, RenameMap, RewriteRules},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// End-of-run report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub converted_count: usize,
    pub total_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub original_bytes: u64,
    pub webp_bytes: u64,
    pub elapsed_seconds: f64,
    /// Conversion failures, one per source file
    pub errors: Vec<FileError>,
    pub text_files_scanned: usize,
    pub rewritten_files: Vec<PathBuf>,
    pub rewrite_errors: Vec<FileError>,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn bytes_saved(&self) -> u64 {
        self.original_bytes.saturating_sub(self.webp_bytes)
    }
}

/// Outcome of the reference rewriting phase
#[derive(Debug, Default)]
struct RewriteReport {
    scanned: usize,
    changed: Vec<PathBuf>,
    errors: Vec<FileError>,
}

pub struct PipelineOrchestrator {
    root: PathBuf,
    config: Arc<Config>,
}

impl PipelineOrchestrator {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            root: root.into(),
            config: Arc::new(config),
        }
    }

    /// Run the full convert → rewrite → report sequence
    pub async fn run(&self) -> Result<RunSummary> {
        let start_time = Instant::now();
        self.config.validate()?;

        if !self.root.is_dir() {
            return Err(PipelineError::MissingInput(format!("asset root {}", self.root.display())).into());
        }

        let sources = self.scanner(&self.config.image_extensions).scan(&self.root);
        self.log_configuration(&sources);

        let results = self.convert_all(sources).await?;

        let mut summary = RunSummary {
            total_count: results.len(),
            dry_run: self.config.dry_run,
            ..Default::default()
        };
        let mut rename_map = RenameMap::new();

        for result in &results {
            match result.outcome() {
                FileOutcome::Converted => {
                    summary.converted_count += 1;
                    summary.original_bytes += result.original_bytes;
                    summary.webp_bytes += result.output_bytes;
                }
                FileOutcome::Skipped(_) => summary.skipped_count += 1,
                FileOutcome::Failed(err) => {
                    summary.error_count += 1;
                    summary.errors.push(err.clone());
                }
            }

            if result.has_webp() {
                if let Some((old, new)) =
                    PathResolver::rename_pair(&result.source_path, &result.output_path, &self.root)
                {
                    rename_map.insert(old, new);
                }
            }
        }

        if rename_map.is_empty() {
            info!("No WebP files produced, skipping reference rewriting");
        } else {
            let report = self.rewrite_references(rename_map).await?;
            summary.text_files_scanned = report.scanned;
            summary.rewritten_files = report.changed;
            summary.rewrite_errors = report.errors;
        }

        summary.elapsed_seconds = start_time.elapsed().as_secs_f64();
        self.print_summary(&summary);

        Ok(summary)
    }

    fn scanner(&self, extensions: &[String]) -> FileTreeScanner {
        FileTreeScanner::new(extensions)
            .follow_links(self.config.follow_links)
            .max_depth(self.config.max_depth)
            .sorted(true)
    }

    fn log_configuration(&self, sources: &[PathBuf]) {
        if self.config.json_output {
            JsonMessage::start(self.root.clone(), sources.len(), &self.config).emit();
            return;
        }

        info!("Converting images under: {}", self.root.display());
        info!(
            "WebP quality: {} | size tolerance: {:.2} | workers: {}",
            self.config.quality, self.config.size_tolerance, self.config.workers
        );
        if self.config.keep_originals {
            info!("Keeping original files");
        }
        if self.config.dry_run {
            info!("Dry run: nothing will be written or deleted");
        }
        info!("Found {} source images", sources.len());
    }

    /// One task per file, bounded by the worker semaphore
    async fn convert_all(&self, sources: Vec<PathBuf>) -> Result<Vec<ConversionResult>> {
        let tracker = ProgressTracker::new(sources.len(), self.config.json_output, self.config.show_progress);
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let task = ConversionTask::new(self.config.clone());

        // Outputs are claimed before spawning: one source per `.webp`
        let mut claims = OutputClaims::new();
        let mut rejected = Vec::new();
        let mut tasks = Vec::with_capacity(sources.len());
        for source in sources {
            if let Ok(output) = PathResolver::webp_path(&source) {
                if let Err(e) = claims.claim(&output, &source) {
                    warn!("Not converting {}: {}", source.display(), e);
                    let result = ConversionResult::rejected(&source, output, &e);
                    tracker.handle_file_completion(&result).await;
                    rejected.push(result);
                    continue;
                }
            }

            let permit = semaphore.clone().acquire_owned().await?;
            let task = task.clone();
            let tracker = tracker.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let result = task.process(source).await;
                tracker.handle_file_completion(&result).await;
                result
            }));
        }

        let mut results = Vec::with_capacity(tasks.len() + rejected.len());
        for handle in tasks {
            match handle.await {
                Ok(result) => {
                    if let FileOutcome::Failed(err) = result.outcome() {
                        error!("Failed to convert {}: {}", err.path.display(), err.message);
                    }
                    results.push(result);
                }
                Err(e) => error!("Conversion task panicked: {}", e),
            }
        }
        results.extend(rejected);

        tracker.finish(&tracker.get_stats().await.format_summary());
        Ok(results)
    }

    async fn rewrite_references(&self, rename_map: RenameMap) -> Result<RewriteReport> {
        let rules = match self.config.rewrite_strategy {
            RewriteStrategy::Heuristic => RewriteRules::Heuristic(ReferenceRewriter::new(
                &self.config.image_extensions,
                &self.config.asset_dir_tokens,
            )?),
            RewriteStrategy::Exact => RewriteRules::Exact(rename_map),
        };
        let rules = Arc::new(rules);

        let text_root = self.text_root();
        let files = self.scanner(&self.config.text_extensions).scan(text_root);
        info!("Rewriting references in {} text files", files.len());

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let dry_run = self.config.dry_run;
        let mut tasks = Vec::with_capacity(files.len());
        for path in files {
            let permit = semaphore.clone().acquire_owned().await?;
            let rules = rules.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                rules.rewrite_file(&path, dry_run).await
            }));
        }

        let mut report = RewriteReport::default();
        for handle in tasks {
            match handle.await {
                Ok(result) => record_rewrite(&mut report, result),
                Err(e) => error!("Rewrite task panicked: {}", e),
            }
        }

        if self.config.json_output {
            JsonMessage::rewrite_complete(report.scanned, report.changed.len(), report.errors.len()).emit();
        } else {
            info!(
                "Updated references in {} of {} files",
                report.changed.len(),
                report.scanned
            );
        }

        Ok(report)
    }

    fn text_root(&self) -> &Path {
        self.config.text_root.as_deref().unwrap_or(&self.root)
    }

    fn print_summary(&self, summary: &RunSummary) {
        if self.config.json_output {
            JsonMessage::complete(summary).emit();
            return;
        }

        info!("=== Conversion Complete ===");
        info!(
            "Converted: {} / {} | Skipped: {} | Errors: {}",
            summary.converted_count, summary.total_count, summary.skipped_count, summary.error_count
        );
        info!(
            "Size: {} -> {} ({} saved)",
            format_size(summary.original_bytes),
            format_size(summary.webp_bytes),
            format_size(summary.bytes_saved())
        );
        info!(
            "Text files: {} scanned, {} updated",
            summary.text_files_scanned,
            summary.rewritten_files.len()
        );
        info!("Elapsed: {:.2}s", summary.elapsed_seconds);

        for err in summary.errors.iter().chain(summary.rewrite_errors.iter()) {
            warn!("  {:?} {}: {}", err.kind, err.path.display(), err.message);
        }
    }
}

fn record_rewrite(report: &mut RewriteReport, result: ReferenceRewriteResult) {
    report.scanned += 1;
    if let Some(err) = result.error {
        error!("Failed to rewrite {}: {}", err.path.display(), err.message);
        report.errors.push(err);
    } else if result.changed {
        debug!("Rewrote references in {}", result.file_path.display());
        report.changed.push(result.file_path);
    }
}
