//! # Site Asset Pipeline Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi principali tramite re-exports per `main.rs` e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: configurazione, validazione e settings file
//! - `error`: `PipelineError` e record `FileError` per il report
//! - `file_manager`: scanner dell'albero file e utilità sui path
//! - `transcoder`: decode raster ed encoding WebP
//! - `policy`: classificazione delle dimensioni e regole di skip
//! - `rewriter`: riscrittura dei riferimenti negli artefatti testuali
//! - `pipeline`: orchestrazione della conversione
//! - `manifest`: gallery, dome gallery e merge delle cover
//! - `thumbnails`: anteprime WebP e relativo indice
//! - `progress` / `json_output`: feedback a terminale ed eventi strutturati
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use site_asset_pipeline::{Config, PipelineOrchestrator};
//!
//! let summary = PipelineOrchestrator::new("dist", Config::default()).run().await?;
//! println!("{} converted", summary.converted_count);
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod manifest;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod rewriter;
pub mod thumbnails;
pub mod transcoder;

pub use config::{Config, ManifestConfig, Settings};
pub use error::{FileError, PipelineError};
pub use manifest::{ManifestGenerator, ManifestOutput};
pub use pipeline::{PipelineOrchestrator, RunSummary};
pub use thumbnails::{ThumbnailGenerator, ThumbnailReport};
