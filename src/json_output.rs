//! # JSON Output Module
//!
//! Output strutturato, un oggetto JSON per riga su stdout, per chi integra la
//! pipeline in un build script.
//!
//! ## Responsabilità:
//! - Serializza gli eventi del comando `convert` con il campo `type` come tag
//! - Riusa i tipi del dominio (`ConversionResult`, `RunSummary`) senza copie ad hoc
//!
//! ## Tipi di messaggi:
//! - `start`: inizio conversione, con la configurazione effettiva
//! - `file_complete`: esito di un singolo file sorgente
//! - `rewrite_complete`: fine della riscrittura dei riferimenti
//! - `complete`: riepilogo finale della run

use crate::{
    config::{Config, RewriteStrategy},
    error::FileError,
    file_manager::calculate_reduction,
    pipeline::{
        orchestrator::RunSummary,
        task::{ConversionResult, FileOutcome},
    },
    policy::{SizeVerdict, SkipReason},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio della conversione
    Start {
        root: PathBuf,
        total_files: usize,
        config: JsonConfig,
    },

    /// Fine elaborazione di un file sorgente
    FileComplete {
        path: PathBuf,
        output_path: PathBuf,
        original_bytes: u64,
        output_bytes: u64,
        reduction_percent: f64,
        verdict: Option<SizeVerdict>,
        skipped: Option<SkipReason>,
        deleted_source: bool,
        error: Option<FileError>,
    },

    /// Riscrittura dei riferimenti completata
    RewriteComplete {
        files_scanned: usize,
        files_changed: usize,
        errors: usize,
    },

    /// Run completata
    Complete(RunSummary),
}

/// Configurazione effettiva riportata nell'evento `start`
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub quality: u8,
    pub size_tolerance: f64,
    pub workers: usize,
    pub keep_originals: bool,
    pub dry_run: bool,
    pub force: bool,
    pub rewrite_strategy: RewriteStrategy,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(root: PathBuf, total_files: usize, config: &Config) -> Self {
        Self::Start {
            root,
            total_files,
            config: JsonConfig::from(config),
        }
    }

    pub fn file_complete(result: &ConversionResult) -> Self {
        let reduction_percent = match result.outcome() {
            FileOutcome::Converted => calculate_reduction(result.original_bytes, result.output_bytes),
            _ => 0.0,
        };

        Self::FileComplete {
            path: result.source_path.clone(),
            output_path: result.output_path.clone(),
            original_bytes: result.original_bytes,
            output_bytes: result.output_bytes,
            reduction_percent,
            verdict: result.verdict,
            skipped: result.skipped,
            deleted_source: result.deleted_source,
            error: result.error.clone(),
        }
    }

    pub fn rewrite_complete(files_scanned: usize, files_changed: usize, errors: usize) -> Self {
        Self::RewriteComplete {
            files_scanned,
            files_changed,
            errors,
        }
    }

    pub fn complete(summary: &RunSummary) -> Self {
        Self::Complete(summary.clone())
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            quality: config.quality,
            size_tolerance: config.size_tolerance,
            workers: config.workers,
            keep_originals: config.keep_originals,
            dry_run: config.dry_run,
            force: config.force,
            rewrite_strategy: config.rewrite_strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_tagged_by_type() {
        let json = serde_json::to_value(JsonMessage::rewrite_complete(10, 3, 1)).unwrap();
        assert_eq!(json["type"], "rewrite_complete");
        assert_eq!(json["files_changed"], 3);

        let json = serde_json::to_value(JsonMessage::start(PathBuf::from("dist"), 4, &Config::default())).unwrap();
        assert_eq!(json["type"], "start");
        assert_eq!(json["config"]["quality"], 80);
        assert_eq!(json["config"]["rewrite_strategy"], "heuristic");
    }

    #[test]
    fn test_complete_flattens_summary() {
        let summary = RunSummary {
            converted_count: 2,
            total_count: 3,
            error_count: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(JsonMessage::complete(&summary)).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["converted_count"], 2);
        assert_eq!(json["total_count"], 3);
    }
}
