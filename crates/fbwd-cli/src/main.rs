//! fbwd CLI
//!
//! Batch entrypoints for Freebase ⇄ Wikidata conversion:
//! - `convert-qids`: QID collection → `MID → QID` dictionary via SPARQL
//! - `property-mapping`: scrape the Freebase/Wikidata property table to JSON

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use fbwd_cli::batch::{convert_qids_with, BatchOptions};
use fbwd_cli::persist::{read_id_collection, write_dictionary};
use fbwd_mapping::{PropertyConverter, DEFAULT_MAPPING_URL};
use fbwd_sparql::{EntityConverter, SparqlClient, SparqlClientConfig, DEFAULT_ENDPOINT};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fbwd")]
#[command(author, version, about = "Freebase ⇄ Wikidata identifier conversion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up the Freebase MID of every QID in a collection.
    ///
    /// Writes a flat `MID → QID` JSON object built from the QIDs that
    /// resolved; unresolved QIDs are only counted.
    ConvertQids(ConvertQidsArgs),

    /// Scrape the WikiProject Freebase mapping page into a JSON object.
    ///
    /// Keys are Freebase properties, values Wikidata property ids or `null`.
    PropertyMapping(PropertyMappingArgs),
}

#[derive(Args, Debug)]
struct ConvertQidsArgs {
    /// JSON array of QIDs (or an object keyed by QID).
    #[arg(short, long, default_value = "id2entity.json")]
    input: PathBuf,

    /// Output `MID → QID` JSON object.
    #[arg(short, long, default_value = "fid2qid.json")]
    output: PathBuf,

    #[command(flatten)]
    endpoint: EndpointArgs,

    /// Lookup worker threads (1 = sequential).
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// Log progress every N lookups (0 = never).
    #[arg(long, default_value_t = 1000)]
    progress_every: usize,
}

#[derive(Args, Debug)]
struct EndpointArgs {
    /// SPARQL endpoint URL.
    #[arg(long, env = "FBWD_SPARQL_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Per-request timeout in seconds (default: HTTP client default).
    #[arg(long, env = "FBWD_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct PropertyMappingArgs {
    /// Mapping page URL.
    #[arg(long, env = "FBWD_MAPPING_URL", default_value = DEFAULT_MAPPING_URL)]
    mapping_url: String,

    /// Output JSON object.
    #[arg(short, long, default_value = "property_mapping.json")]
    output: PathBuf,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::ConvertQids(args) => cmd_convert_qids(args),
        Commands::PropertyMapping(args) => cmd_property_mapping(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_convert_qids(args: ConvertQidsArgs) -> Result<()> {
    let qids = read_id_collection(&args.input)?;
    let config = SparqlClientConfig::new(&args.endpoint.endpoint)
        .with_timeout(args.endpoint.timeout_secs.map(Duration::from_secs));
    let client = SparqlClient::new(config).context("failed to create sparql client")?;
    let converter = EntityConverter::new(client);

    println!(
        "{} input={} endpoint={} qids={} jobs={}",
        "Convert QIDs".green().bold(),
        args.input.display(),
        args.endpoint.endpoint,
        qids.len(),
        args.jobs
    );

    let options = BatchOptions {
        jobs: args.jobs,
        progress_every: args.progress_every,
    };
    let report = convert_qids_with(&converter, &qids, &options)?;
    write_dictionary(&args.output, &report.mapping)?;

    tracing::info!(
        successes = report.successes,
        failures = report.failures,
        total = report.total,
        distinct_mids = report.mapping.len(),
        "batch finished"
    );
    println!("  {} found: {}", "→".green(), report.successes);
    println!(
        "  {} not found: {} / {} ({:.1}%)",
        "→".yellow(),
        report.failures,
        report.total,
        report.failure_ratio() * 100.0
    );
    println!("  {} {}", "→".cyan(), args.output.display());
    Ok(())
}

fn cmd_property_mapping(args: PropertyMappingArgs) -> Result<()> {
    let converter = PropertyConverter::new(&args.mapping_url)
        .with_context(|| format!("failed to load property mapping from {}", args.mapping_url))?;
    let mapping = converter.mapping();
    write_dictionary(&args.output, mapping)?;

    println!(
        "{} properties={} mapped={}",
        "Property mapping".green().bold(),
        mapping.len(),
        mapping.mapped_len()
    );
    println!("  {} {}", "→".cyan(), args.output.display());
    Ok(())
}
