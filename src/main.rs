//! `kevt` — CLI for the kevents store (component H).
//!
//! A thin harness around the library: `write` accepts JSON-lines `Event`
//! records on stdin for local testing (the real Kubernetes watch client is
//! out of scope here); `query`, `info`, `scan`, and `stats` inspect a store
//! or a single file.

use clap::{Args, Parser, Subcommand};
use kevents::{EventFilters, Storage, StoreConfig, StoreConfigArgs};
use std::io::BufRead;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kevt", version = "0.1.0", about = "Kubernetes resource-change event store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding the store's hour files and catalog sidecar
    dir: PathBuf,
    #[command(flatten)]
    config: StoreConfigArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Append events read as JSON-lines from stdin
    Write {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Query a time range, optionally filtered, and print matching events as JSON-lines
    Query {
        #[command(flatten)]
        store: StoreArgs,
        /// Inclusive lower bound, seconds since epoch
        #[arg(long)]
        ts_min: i64,
        /// Inclusive upper bound, seconds since epoch
        #[arg(long)]
        ts_max: i64,
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        uid: Option<String>,
    },
    /// Show header, footer, and IndexSection summary for one file
    Info {
        file: PathBuf,
    },
    /// Forward-scan a file whose footer is missing or unreadable
    Scan {
        file: PathBuf,
    },
    /// Print catalog and cache statistics for a store directory
    Stats {
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Write { store } => cmd_write(store),
        Commands::Query { store, ts_min, ts_max, namespace, kind, name, uid } => {
            cmd_query(store, ts_min, ts_max, namespace, kind, name, uid)
        }
        Commands::Info { file } => cmd_info(&file),
        Commands::Scan { file } => cmd_scan(&file),
        Commands::Stats { store } => cmd_stats(store),
    }
}

fn open_store(store: StoreArgs) -> Result<Storage, Box<dyn std::error::Error>> {
    let config: StoreConfig = store.config.into();
    Ok(Storage::open(&store.dir, config)?)
}

fn cmd_write(store: StoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_store(store)?;
    let stdin = std::io::stdin();
    let mut count = 0u64;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: kevents::Event = serde_json::from_str(&line)?;
        storage.write_event(event)?;
        count += 1;
    }
    storage.close()?;
    println!("wrote {count} event(s)");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_query(
    store: StoreArgs,
    ts_min: i64,
    ts_max: i64,
    namespace: Option<String>,
    kind: Option<String>,
    name: Option<String>,
    uid: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_store(store)?;
    let filters = EventFilters { namespace, kind, name, uid, labels: Default::default() };
    let result = storage.query(
        kevents::time::seconds_to_ns(ts_min),
        kevents::time::seconds_to_ns(ts_max),
        &filters,
        None,
    )?;
    for qe in &result.events {
        let line = serde_json::json!({
            "event": qe.event,
            "pre_existing": qe.pre_existing,
        });
        println!("{}", serde_json::to_string(&line)?);
    }
    eprintln!("{} event(s) matched", result.count);
    Ok(())
}

fn cmd_info(file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let reader = kevents::FileReader::open(file)?;
    let header = reader.header();
    println!("── kevents file ─────────────────────────────────────────");
    println!("  Path           {}", file.display());
    println!("  Format version {}", header.version);
    println!("  Hour range     {} .. {} (UTC seconds since epoch)", header.hour_start, header.hour_end());
    let index = reader.index();
    println!("  Blocks         {}", index.blocks.len());
    let events: u64 = index.blocks.iter().map(|b| b.event_count).sum();
    println!("  Events         {events}");
    println!("  Resources      {}", index.final_states.len());
    Ok(())
}

fn cmd_scan(file: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let report = kevents::scan_file(file)?;
    println!("── forward-scan recovery ────────────────────────────────");
    println!("  Path           {}", file.display());
    println!("  Blocks found   {}", report.blocks.len());
    println!("  Events found   {}", report.event_count());
    println!("  Bytes scanned  {}", report.bytes_scanned);
    println!("  Quality        {:?}", report.quality);
    Ok(())
}

fn cmd_stats(store: StoreArgs) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_store(store)?;
    let stats = storage.cache_stats();
    println!("── store stats ──────────────────────────────────────────");
    println!("  Cataloged files   {}", storage.catalog_count());
    println!("  Cache hits        {}", stats.hits);
    println!("  Cache misses      {}", stats.misses);
    println!("  Cache invalidations {}", stats.invalidations);
    Ok(())
}
