mod db;
mod dedupe;
mod error;
mod extract;
mod load;
mod logging;
mod markup;
mod pipeline;
mod record;
mod report;
mod settings;
mod transform;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use reqwest::blocking::Client;
use tracing::info;

use db::DocumentStore;
use extract::{HttpSource, ThreadSleeper};
use load::HttpMetadataSink;
use pipeline::{extract_unique, Pipeline, RunOptions};
use record::RecordKey;
use settings::Settings;

#[derive(Parser)]
#[command(name = "leaves_etl", about = "Bookmarked-article ETL: source API -> metadata table + document store")]
struct Cli {
    /// Settings file (defaults to ./leaves.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, dedupe, transform and load once
    Run {
        /// Stop after transform without touching either sink
        #[arg(long)]
        dry_run: bool,
        /// Max unique records to process
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Fetch and dedupe only, print what would be processed
    Extract {
        /// How many ids to print
        #[arg(short = 'n', long, default_value = "20")]
        show: usize,
    },
    /// Document store statistics
    Stats,
    /// Most recent documents in the configured collection
    List {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// One stored document by record id
    Show {
        record_id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let _guard = logging::init(&settings.log)?;
    info!(?settings, "Starting leaves ETL");

    let t0 = Instant::now();
    let result = match cli.command {
        Commands::Run { dry_run, limit } => {
            let source = HttpSource::new(
                http_client(settings.source.timeout_secs)?,
                settings.source.url.clone(),
            );
            let metadata_sink = HttpMetadataSink::new(
                http_client(settings.metadata.timeout_secs)?,
                settings.metadata.url.clone(),
            );
            let mut store = open_store(&settings)?;

            let run_id = report::new_run_id(Utc::now());
            store.set_run_id(&run_id);

            let report = Pipeline {
                source: &source,
                metadata_sink: &metadata_sink,
                content_sink: &mut store,
                retry: settings.retry_policy(),
                pacing: settings.pacing_policy(),
                sleeper: &ThreadSleeper,
            }
            .run(run_id, &RunOptions { dry_run, limit });

            for line in report.summary_lines() {
                println!("{}", line);
            }
            Ok(())
        }
        Commands::Extract { show } => {
            let source = HttpSource::new(
                http_client(settings.source.timeout_secs)?,
                settings.source.url.clone(),
            );
            let (extracted, records) =
                extract_unique(&source, &settings.retry_policy(), &ThreadSleeper);
            println!(
                "Extracted {} records, {} unique ({} duplicates)",
                extracted,
                records.len(),
                extracted - records.len()
            );
            for record in records.iter().take(show) {
                let title = record
                    .field("title")
                    .and_then(|t| t.as_str())
                    .unwrap_or("-");
                println!("  {:<12} {}", record.id().to_string(), truncate(title, 60));
            }
            Ok(())
        }
        Commands::Stats => {
            let store = open_store(&settings)?;
            let stats = store.stats()?;
            if stats.is_empty() {
                println!("Document store is empty: {:?}", settings.content.db_path);
                return Ok(());
            }
            println!("{:<20} | {:>9} | {:>5} | {:<19}", "Collection", "Documents", "Runs", "Last insert");
            println!("{}", "-".repeat(62));
            for s in stats {
                println!(
                    "{:<20} | {:>9} | {:>5} | {:<19}",
                    truncate(&s.collection, 20),
                    s.documents,
                    s.runs,
                    s.last_insert.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Commands::List { limit } => {
            let store = open_store(&settings)?;
            let docs = store.list(limit)?;
            if docs.is_empty() {
                println!("No documents in collection '{}'.", store.collection());
                return Ok(());
            }
            for doc in &docs {
                let title = doc.body.get("title").and_then(|t| t.as_str()).unwrap_or("-");
                println!(
                    "{:>6} | {:<12} | {:<19} | {:<20} | {}",
                    doc.id,
                    truncate(&doc.record_id, 12),
                    doc.inserted_at,
                    doc.run_id.as_deref().unwrap_or("-"),
                    truncate(title, 50)
                );
            }
            println!("\n{} of {} documents", docs.len(), store.count()?);
            Ok(())
        }
        Commands::Show { record_id } => {
            let store = open_store(&settings)?;
            match store.find_by_record_id(&RecordKey::parse(&record_id))? {
                Some(doc) => println!("{}", serde_json::to_string_pretty(&doc.body)?),
                None => println!("Record not found: {}", record_id),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

fn open_store(settings: &Settings) -> Result<DocumentStore> {
    DocumentStore::open(&settings.content.db_path, &settings.content.collection)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
