//! CLI binary entry point for tabular-upsert

#[cfg(feature = "cli")]
use anyhow::Context;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tabular_upsert_sdk::cli::commands::click::{ClickArgs, handle_click};
#[cfg(feature = "cli")]
use tabular_upsert_sdk::cli::commands::config::{handle_sample_config, handle_show_config};
#[cfg(feature = "cli")]
use tabular_upsert_sdk::cli::commands::upload::{UploadArgs, handle_upload};
#[cfg(feature = "cli")]
use tabular_upsert_sdk::models::EntityKind;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "tabular-upsert")]
#[command(about = "Apply student, teacher and game spreadsheets to a record store")]
#[command(version)]
struct Cli {
    /// Log filter, e.g. "debug" or "tabular_upsert_sdk=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Upload a worksheet and print the report
    Upload {
        /// Kind of record the worksheet holds
        #[arg(value_enum)]
        kind: KindArg,
        /// Worksheet file
        file: PathBuf,
        /// JSON snapshot store to apply the upload to
        #[arg(short, long)]
        store: Option<PathBuf>,
        /// Directory containing .tabular-upsert.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Report without saving the snapshot
        #[arg(long)]
        dry_run: bool,
        /// Pretty-print the report
        #[arg(short, long)]
        pretty: bool,
    },
    /// Record clicks on a game
    Click {
        game_id: String,
        /// JSON snapshot store holding the game
        #[arg(short, long)]
        store: PathBuf,
        /// Number of clicks to add
        #[arg(long, default_value_t = 1)]
        by: u32,
    },
    /// Print a sample configuration file
    SampleConfig,
    /// Print the effective configuration
    ShowConfig {
        /// Directory containing .tabular-upsert.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Student,
    Teacher,
    Game,
}

#[cfg(feature = "cli")]
fn convert_kind(kind: KindArg) -> EntityKind {
    match kind {
        KindArg::Student => EntityKind::Student,
        KindArg::Teacher => EntityKind::Teacher,
        KindArg::Game => EntityKind::Game,
    }
}

#[cfg(feature = "cli")]
fn init_logging(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Upload {
            kind,
            file,
            store,
            config,
            dry_run,
            pretty,
        } => {
            let args = UploadArgs {
                kind: convert_kind(kind),
                file,
                store,
                config_dir: config,
                dry_run,
                pretty,
            };
            handle_upload(&args)
                .with_context(|| format!("Upload of {} failed", args.file.display()))
        }
        Commands::Click { game_id, store, by } => {
            let args = ClickArgs { game_id, store, by };
            handle_click(&args)
                .with_context(|| format!("Could not record click on {}", args.game_id))
        }
        Commands::SampleConfig => Ok(handle_sample_config()?),
        Commands::ShowConfig { config } => Ok(handle_show_config(config)?),
    }
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
