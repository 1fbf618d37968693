//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore della pipeline.
//!
//! ## Responsabilità:
//! - Definisce `PipelineError` per categorizzare gli errori possibili
//! - Distingue errori fatali di pre-flight (`MissingInput`, `InvalidConfig`)
//!   da errori per singolo file (`Decode`, `Encode`, `Rewrite`, `Io`, `OutputCollision`)
//! - Fornisce `FileError`, il record serializzabile che finisce nel report finale
//!
//! ## Politica di propagazione:
//! - Gli errori per singolo file non interrompono mai il batch: vengono
//!   convertiti in `FileError` e accumulati
//! - Solo gli errori di pre-flight risalgono fino a `main` con exit code != 0
//!
//! ## Esempio:
//! ```rust,ignore
//! if !descriptions.exists() {
//!     return Err(PipelineError::MissingInput(descriptions.display().to_string()));
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Error types for the asset pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Required input missing: {0}")]
    MissingInput(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Rewrite error for {path}: {message}")]
    Rewrite { path: PathBuf, message: String },

    #[error("Output {} is already claimed by {}", .output.display(), .claimed_by.display())]
    OutputCollision { output: PathBuf, claimed_by: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl PipelineError {
    /// Classify the error for the end-of-run report
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Decode(_) | PipelineError::Image(_) => ErrorKind::Decode,
            PipelineError::Encode(_) => ErrorKind::Encode,
            PipelineError::Rewrite { .. } => ErrorKind::Rewrite,
            _ => ErrorKind::Io,
        }
    }
}

/// Category of a per-file failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Encode,
    Io,
    Rewrite,
}

/// A per-file failure, collected instead of raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileError {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

impl FileError {
    pub fn new(path: &Path, error: &PipelineError) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
