//! # Site Asset Pipeline - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing della command line con `clap` (un subcommand per pipeline)
//! - Inizializzazione del logging con `tracing` + `EnvFilter`
//! - Caricamento dei settings e applicazione degli override da CLI
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (`RUST_LOG`, altrimenti INFO o DEBUG con `--verbose`)
//! 3. Carica i settings da `--config` o dal file utente di default
//! 4. Avvia la pipeline richiesta; gli errori di pre-flight escono con codice != 0
//!
//! ## Esempio di utilizzo:
//! ```bash
//! asset-pipeline convert dist --quality 80 --workers 8
//! asset-pipeline manifest --public-root public --metadata src/data/events.json
//! asset-pipeline thumbnails --force
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use site_asset_pipeline::{
    config::{IdScheme, RewriteStrategy},
    ManifestGenerator, PipelineOrchestrator, Settings, ThumbnailGenerator,
};

#[derive(Parser)]
#[command(name = "asset-pipeline")]
#[command(about = "Convert site images to WebP, patch references and rebuild gallery manifests")]
#[command(version)]
struct Cli {
    /// JSON settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert raster images to WebP and rewrite references to them
    Convert(ConvertArgs),
    /// Regenerate gallery and dome manifests from the asset tree
    Manifest(ManifestArgs),
    /// Build WebP thumbnails and their index
    Thumbnails(ThumbnailArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// Directory tree containing the images (and, by default, the text artifacts)
    root: PathBuf,

    /// WebP quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Accepted size ratio before a conversion is logged as "converted anyway"
    #[arg(short, long)]
    tolerance: Option<f64>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Keep the original files next to the WebP output
    #[arg(long)]
    keep_originals: bool,

    /// Dry run - transcode and report, write nothing
    #[arg(long)]
    dry_run: bool,

    /// Re-convert sources whose .webp already exists
    #[arg(long)]
    force: bool,

    /// Rewrite only the exact paths converted in this run
    #[arg(long)]
    exact_rewrite: bool,

    /// Directory holding the JS/CSS/HTML to patch (defaults to ROOT)
    #[arg(long)]
    text_root: Option<PathBuf>,

    /// Emit one JSON event per line instead of log output
    #[arg(long)]
    json: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Args)]
struct ManifestArgs {
    /// Public web root
    #[arg(long)]
    public_root: Option<PathBuf>,

    /// Description table (collection -> file -> text)
    #[arg(long)]
    descriptions: Option<PathBuf>,

    /// Hand-authored collection metadata carrying coverImage
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Derive entry ids from file content instead of enumeration order
    #[arg(long)]
    content_hash_ids: bool,

    /// Seed for the display height choice
    #[arg(long)]
    seed: Option<u64>,

    /// Accepted for symmetry with `thumbnails`; manifests are always rewritten
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct ThumbnailArgs {
    /// Public web root
    #[arg(long)]
    public_root: Option<PathBuf>,

    /// Rebuild thumbnails that already exist
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let settings_path = cli.config.clone().or_else(Settings::default_path);
    let settings = match settings_path {
        Some(ref path) => {
            debug!("Loading settings from {}", path.display());
            Settings::from_file(path).await?
        }
        None => Settings::default(),
    };

    match cli.command {
        Commands::Convert(args) => convert(args, settings).await,
        Commands::Manifest(args) => manifest(args, settings).await,
        Commands::Thumbnails(args) => thumbnails(args, settings).await,
    }
}

async fn convert(args: ConvertArgs, settings: Settings) -> Result<()> {
    let mut config = settings.convert;
    if let Some(quality) = args.quality {
        config.quality = quality;
    }
    if let Some(tolerance) = args.tolerance {
        config.size_tolerance = tolerance;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.text_root.is_some() {
        config.text_root = args.text_root;
    }
    if args.exact_rewrite {
        config.rewrite_strategy = RewriteStrategy::Exact;
    }
    config.keep_originals |= args.keep_originals;
    config.dry_run |= args.dry_run;
    config.force |= args.force;
    config.json_output |= args.json;
    config.show_progress &= !args.no_progress;

    PipelineOrchestrator::new(args.root, config).run().await?;
    Ok(())
}

async fn manifest(args: ManifestArgs, settings: Settings) -> Result<()> {
    let mut config = settings.manifest;
    if let Some(public_root) = args.public_root {
        config.public_root = public_root;
    }
    if let Some(descriptions) = args.descriptions {
        config.descriptions_file = descriptions;
    }
    if args.metadata.is_some() {
        config.metadata_file = args.metadata;
    }
    if args.content_hash_ids {
        config.id_scheme = IdScheme::ContentHash;
    }
    config.force |= args.force;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    ManifestGenerator::new(config).run(&mut rng).await?;
    Ok(())
}

async fn thumbnails(args: ThumbnailArgs, settings: Settings) -> Result<()> {
    let mut config = settings.manifest;
    if let Some(public_root) = args.public_root {
        config.public_root = public_root;
    }
    config.force |= args.force;

    let report = ThumbnailGenerator::new(config).run().await?;
    info!("{} thumbnails indexed", report.index.values().map(Vec::len).sum::<usize>());
    Ok(())
}
