//! Lexicon resolver CLI
//!
//! Resolves the words of one segment against the dictionaries and records
//! the outcome, or resets every store.
//!
//! # Usage
//!
//! ```bash
//! # Resolve a segment given inline
//! lexicon_resolver resolve --ref "Berakhot 2a:1" --text "מאימתי קורין את שמע בערבין"
//!
//! # Resolve a segment read from a file (or stdin), JSON output
//! lexicon_resolver resolve --ref "Berakhot 2a:1" --file segment.txt -o json
//!
//! # Clear the association cache, word-form store and audit log
//! lexicon_resolver reset --yes
//! ```

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use lexicon_resolver::{
    ResolutionOrchestrator, ResolverConfig, SegmentResolution, Stores, WordOutcome, WordSegmenter,
};

#[derive(Parser)]
#[command(name = "lexicon_resolver")]
#[command(version = "0.1.0")]
#[command(about = "Resolve dictionary entries for the words of a classical text")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every word and phrase of one segment
    Resolve {
        /// Location of the segment, e.g. "Berakhot 2a:1"
        #[arg(long = "ref")]
        location_ref: String,

        /// Segment text
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the segment from a file (reads stdin if neither is given)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Skip oracle phrase detection, resolve single words only
        #[arg(long)]
        words_only: bool,
    },

    /// Clear the association cache, word-form store and audit log
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Resolve {
            location_ref,
            text,
            file,
            words_only,
        } => cmd_resolve(&location_ref, text, file, words_only, cli.format).await,
        Commands::Reset { yes } => cmd_reset(yes).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn build_orchestrator() -> Result<ResolutionOrchestrator> {
    let config = ResolverConfig::from_env().context("Failed to load configuration")?;
    let stores = build_stores(&config).await?;
    ResolutionOrchestrator::from_config(&config, stores).context("Failed to build orchestrator")
}

#[cfg(feature = "database")]
async fn build_stores(config: &ResolverConfig) -> Result<Stores> {
    use lexicon_resolver::{DatabaseConfig, DatabaseManager};

    match DatabaseConfig::from_resolver_config(config) {
        Some(db_config) => {
            let manager = DatabaseManager::new(db_config)
                .await
                .context("Failed to connect to database")?;
            manager.test_connection().await?;
            manager.ensure_schema().await?;
            Ok(manager.stores())
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            Ok(Stores::in_memory())
        }
    }
}

#[cfg(not(feature = "database"))]
async fn build_stores(_config: &ResolverConfig) -> Result<Stores> {
    Ok(Stores::in_memory())
}

async fn cmd_resolve(
    location_ref: &str,
    text: Option<String>,
    file: Option<PathBuf>,
    words_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => read_input(file)?,
    };
    if text.trim().is_empty() {
        bail!("Segment text is empty");
    }

    let mut orchestrator = build_orchestrator().await?;
    if words_only {
        orchestrator = orchestrator.with_segmenter(Arc::new(WordSegmenter));
    }

    let resolution = orchestrator.resolve_segment(location_ref, text.trim()).await?;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
        OutputFormat::Pretty => print_resolution(&resolution),
    }

    if resolution.failures().next().is_some() {
        bail!("Some words could not be resolved");
    }
    Ok(())
}

async fn cmd_reset(yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to reset without --yes");
    }
    let orchestrator = build_orchestrator().await?;
    orchestrator.reset().await?;
    println!("{} All stores cleared", "OK".green().bold());
    Ok(())
}

fn print_resolution(resolution: &SegmentResolution) {
    println!("{}", resolution.location_ref.bold());
    for word in &resolution.words {
        match &word.outcome {
            WordOutcome::Resolved { entries } => {
                let entries: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
                println!("  {} {} → {}", "OK".green(), word.word, entries.join(", "));
            }
            WordOutcome::NoEntries { reasoning } => {
                println!("  {} {} → no entries ({})", "--".yellow(), word.word, reasoning);
            }
            WordOutcome::Failed { kind, message } => {
                println!("  {} {} [{}] {}", "ERR".red(), word.word, kind, message);
            }
        }
    }
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read '{}'", path.display())),
        None => {
            if io::stdin().is_terminal() {
                bail!("No input provided. Use --text, --file or pipe input via stdin.");
            }
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}
