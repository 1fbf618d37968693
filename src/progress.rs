//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce la progress bar e le statistiche della conversione.
//!
//! ## Responsabilità:
//! - Progress bar con `indicatif`, nascosta in modalità JSON o con `show_progress = false`
//! - Statistiche cumulative: convertiti, saltati, errori, bytes prima e dopo
//! - Percentuale di riduzione e riepilogo human-readable
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:04] [========================>---------------] 61/100 (61%) [OK] team.jpg: 42.1% saved
//! ```
//!
//! ## Esempio:
//! ```rust,ignore
//! let progress = ProgressManager::new(total_files, true);
//! let mut stats = RunStats::new();
//!
//! stats.record(&result);
//! progress.update("[OK] team.jpg");
//!
//! progress.finish(&stats.format_summary());
//! ```

use crate::file_manager::{calculate_reduction, format_size};
use crate::pipeline::task::{ConversionResult, FileOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Manages progress reporting for a conversion run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager; a hidden bar swallows every update
    pub fn new(total_files: u64, visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_files);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Cumulative conversion statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub files_processed: usize,
    pub files_converted: usize,
    pub files_skipped: usize,
    pub errors: usize,
    /// Size of the converted sources
    pub original_bytes: u64,
    /// Size of the WebP files that replaced them
    pub webp_bytes: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_converted(&mut self, original_size: u64, webp_size: u64) {
        self.files_processed += 1;
        self.files_converted += 1;
        self.original_bytes += original_size;
        self.webp_bytes += webp_size;
    }

    pub fn add_skipped(&mut self) {
        self.files_processed += 1;
        self.files_skipped += 1;
    }

    pub fn add_error(&mut self) {
        self.files_processed += 1;
        self.errors += 1;
    }

    pub fn record(&mut self, result: &ConversionResult) {
        match result.outcome() {
            FileOutcome::Converted => self.add_converted(result.original_bytes, result.output_bytes),
            FileOutcome::Skipped(_) => self.add_skipped(),
            FileOutcome::Failed(_) => self.add_error(),
        }
    }

    /// Bytes saved; negative savings count as zero
    pub fn bytes_saved(&self) -> u64 {
        self.original_bytes.saturating_sub(self.webp_bytes)
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        calculate_reduction(self.original_bytes, self.webp_bytes)
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Converted: {} | Skipped: {} | Errors: {} | {} -> {} ({} saved, {:.2}%)",
            self.files_processed,
            self.files_converted,
            self.files_skipped,
            self.errors,
            format_size(self.original_bytes),
            format_size(self.webp_bytes),
            format_size(self.bytes_saved()),
            self.overall_reduction_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_always_add_up() {
        let mut stats = RunStats::new();
        stats.add_converted(1000, 400);
        stats.add_converted(500, 520);
        stats.add_skipped();
        stats.add_error();

        assert_eq!(stats.files_processed, 4);
        assert_eq!(
            stats.files_converted + stats.files_skipped + stats.errors,
            stats.files_processed
        );
        assert_eq!(stats.original_bytes, 1500);
        assert_eq!(stats.webp_bytes, 920);
        assert_eq!(stats.bytes_saved(), 580);
    }

    #[test]
    fn test_growth_never_underflows() {
        let mut stats = RunStats::new();
        stats.add_converted(100, 150);
        assert_eq!(stats.bytes_saved(), 0);
        assert!(stats.format_summary().contains("Converted: 1"));
    }

    #[test]
    fn test_hidden_progress_accepts_updates() {
        let progress = ProgressManager::new(3, false);
        progress.update("one");
        progress.finish("done");
    }
}
