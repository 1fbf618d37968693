//! # Pipeline Module
//!
//! Conversione WebP e riscrittura dei riferimenti, separate in sottomoduli:
//! - `orchestrator`: sequenza scan → conversione → riscrittura → riepilogo
//! - `task`: worker per il singolo file sorgente
//! - `progress_tracker`: statistiche ed eventi condivisi tra i worker
//! - `path_resolver`: path `.webp` e coppie della rename map

pub mod orchestrator;
pub mod path_resolver;
pub mod progress_tracker;
pub mod task;

pub use orchestrator::{PipelineOrchestrator, RunSummary};
pub use path_resolver::{OutputClaims, PathResolver};
pub use progress_tracker::ProgressTracker;
pub use task::{ConversionResult, ConversionTask, FileOutcome};
