//! Remote entity generator
//!
//! Reads a learned command table, optional entity metadata and optional
//! settings, runs one generation pass and writes the result to stdout.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ha_config::{load_document, SynthConfig};
use ha_synth::{compile, CommandTable, CompileInput, EntityMetadata};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Turn learned IR/RF remote commands into virtual entities.
#[derive(Parser, Debug)]
#[command(name = "ha-synth")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Learned command table (`{device: {command: code}}`), YAML or JSON.
    #[arg(short, long)]
    commands: PathBuf,

    /// Entity metadata keyed by entity id, YAML or JSON.
    #[arg(short, long)]
    entities: Option<PathBuf>,

    /// Generator settings, YAML or JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Print only the generation report.
    #[arg(long)]
    report_only: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

fn render<T: Serialize>(value: &T, format: Format) -> Result<String> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(value).context("Failed to encode JSON")?,
        Format::Yaml => serde_yaml::to_string(value).context("Failed to encode YAML")?,
    })
}

fn run(args: &Args) -> Result<String> {
    let commands: CommandTable = load_document(&args.commands)
        .with_context(|| format!("Failed to load commands from {}", args.commands.display()))?;

    let entities: BTreeMap<String, EntityMetadata> = match &args.entities {
        Some(path) => load_document(path)
            .with_context(|| format!("Failed to load entity metadata from {}", path.display()))?,
        None => BTreeMap::new(),
    };

    let config = match &args.config {
        Some(path) => SynthConfig::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => SynthConfig::default(),
    };

    let input = CompileInput::new(commands).with_entities(entities);
    let compilation = compile(&input, &config).context("Generated document is inconsistent")?;

    if compilation.report.has_skips() {
        for skipped in &compilation.report.skipped {
            warn!("Skipped {}", skipped);
        }
        warn!(
            "{} entities skipped, see the report for details",
            compilation.report.skipped.len()
        );
    }

    if args.report_only {
        render(&compilation.report, args.format)
    } else {
        render(&compilation, args.format)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the document, logs go to stderr
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!("Reading commands from {}", args.commands.display());
    let output = run(&args)?;
    println!("{output}");
    Ok(())
}
