//! # Progress Tracking Module
//!
//! Unico punto di serializzazione tra i worker: accumula le statistiche,
//! aggiorna la progress bar e, in modalità JSON, emette un evento per file.

use crate::{
    json_output::JsonMessage,
    pipeline::task::{ConversionResult, FileOutcome},
    progress::{ProgressManager, RunStats},
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thread-safe tracker shared by every conversion task
#[derive(Clone)]
pub struct ProgressTracker {
    pub total_files: usize,
    json_output: bool,
    stats: Arc<Mutex<RunStats>>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    pub fn new(total_files: usize, json_output: bool, show_progress: bool) -> Self {
        Self {
            total_files,
            json_output,
            stats: Arc::new(Mutex::new(RunStats::new())),
            progress_manager: ProgressManager::new(total_files as u64, show_progress && !json_output),
        }
    }

    /// Record a finished file: stats, JSON event, progress message
    pub async fn handle_file_completion(&self, result: &ConversionResult) {
        self.stats.lock().await.record(result);

        if self.json_output {
            JsonMessage::file_complete(result).emit();
        }

        let name = result
            .source_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy();
        let message = match result.outcome() {
            FileOutcome::Converted => format!("[OK] {}", name),
            FileOutcome::Skipped(reason) => format!("[SKIP] {}: {:?}", name, reason),
            FileOutcome::Failed(_) => format!("[ERROR] {}", name),
        };
        self.progress_manager.update(&message);
    }

    /// Finalizza progress bar
    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }

    /// Snapshot of the accumulated statistics
    pub async fn get_stats(&self) -> RunStats {
        self.stats.lock().await.clone()
    }
}
