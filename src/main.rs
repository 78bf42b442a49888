//! roster-harvest - Instructor directory harvester

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use roster_harvest::backends::graphql::DEFAULT_ENDPOINT;
use roster_harvest::backends::{GraphQlConfig, GraphQlExecutor};
use roster_harvest::harvest::{DEFAULT_PAGE_CEILING, DEFAULT_SCHOOL_ID};
use roster_harvest::output::DEFAULT_OUTPUT_PATH;
use roster_harvest::{
    BackoffConfig, EntityRecord, HarvestConfig, HarvestReport, Harvester, JsonlStore,
    PaginationStyle, WriteMode,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Records shown in the closing summary.
const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "roster-harvest")]
#[command(author, version, about = "Harvest instructor profiles from a capped search API")]
struct Cli {
    /// Maximum number of unique records to collect
    #[arg(long, env = "ROSTER_HARVEST_MAX")]
    max: Option<usize>,

    /// Number of records to enrich with detail queries
    #[arg(long, env = "ROSTER_HARVEST_ENHANCE", default_value_t = 0)]
    enhance: usize,

    /// Cap the harvest at 10 records
    #[arg(long)]
    test: bool,

    /// Output file (JSON lines)
    #[arg(short, long, env = "ROSTER_HARVEST_OUTPUT", default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Append to the output file instead of replacing it
    #[arg(long)]
    append: bool,

    /// Pagination style: cursor or offset
    #[arg(long, env = "ROSTER_HARVEST_PAGINATION", default_value = "cursor")]
    pagination: PaginationStyle,

    /// Records per page (defaults to 100 for cursor, 50 for offset)
    #[arg(long, env = "ROSTER_HARVEST_PAGE_SIZE")]
    page_size: Option<u32>,

    /// Maximum pages fetched per partition
    #[arg(long, env = "ROSTER_HARVEST_PAGE_CEILING", default_value_t = DEFAULT_PAGE_CEILING)]
    page_ceiling: u32,

    /// Numeric school id
    #[arg(long, env = "ROSTER_HARVEST_SCHOOL_ID", default_value_t = DEFAULT_SCHOOL_ID)]
    school_id: u64,

    /// School display name stamped on records
    #[arg(long, env = "ROSTER_HARVEST_SCHOOL_NAME")]
    school_name: Option<String>,

    /// GraphQL endpoint URL
    #[arg(long, env = "ROSTER_HARVEST_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Minimum delay between requests, in milliseconds
    #[arg(long, env = "ROSTER_HARVEST_DELAY_MS", default_value_t = 1000)]
    delay_ms: u64,

    /// Request timeout, in seconds
    #[arg(long, env = "ROSTER_HARVEST_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Write the harvest report as JSON to this path
    #[arg(long, env = "ROSTER_HARVEST_REPORT")]
    report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long, env = "ROSTER_HARVEST_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Cli {
    fn harvest_config(&self) -> HarvestConfig {
        let mut config = HarvestConfig::new()
            .with_max_records(self.max)
            .with_test_mode(self.test)
            .with_enrichment_sample(self.enhance)
            .with_pagination(self.pagination)
            .with_page_size(self.page_size)
            .with_page_ceiling(self.page_ceiling)
            .with_school_id(self.school_id)
            .with_write_mode(if self.append {
                WriteMode::Append
            } else {
                WriteMode::Overwrite
            });

        if let Some(name) = &self.school_name {
            config = config.with_school_name(name.clone());
        }
        config
    }

    fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig::default().with_pacing(Duration::from_millis(self.delay_ms))
    }

    fn graphql_config(&self) -> GraphQlConfig {
        GraphQlConfig::new(self.endpoint.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    // RUST_LOG takes precedence
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));

    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(cli.verbose);

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .try_init()?,
    }

    Ok(())
}

fn print_summary(records: &[EntityRecord], report: &HarvestReport, output: &Path) {
    println!("Collected {} unique records", records.len());
    if let Some(total) = report.source_reported_total {
        println!("Source reports {total} instructors in total");
    }
    if let Some(written) = report.records_written {
        println!("Wrote {written} records to {}", output.display());
    }

    let abandoned = report.abandoned_partitions();
    if !abandoned.is_empty() {
        let keys: Vec<&str> = abandoned
            .iter()
            .map(|p| if p.key.is_empty() { "*" } else { p.key.as_str() })
            .collect();
        println!("Abandoned partitions: {}", keys.join(", "));
    }

    if let Some(enrichment) = report.enrichment {
        println!(
            "Enriched {} of {} sampled records ({} failed)",
            enrichment.enriched, enrichment.attempted, enrichment.failed
        );
    }

    if records.is_empty() {
        return;
    }

    println!();
    println!("Sample:");
    for record in records.iter().take(SAMPLE_SIZE) {
        let rating = record
            .aggregate_rating
            .map_or_else(|| "n/a".to_string(), |r| format!("{r:.1}"));
        let ratings = record.num_ratings.unwrap_or(0);
        println!(
            "  {} ({}) rating {rating} from {ratings} ratings",
            record.full_name, record.department
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli)?;

    let executor = GraphQlExecutor::new(cli.graphql_config())
        .context("Failed to create GraphQL executor")?;

    let harvester = Harvester::builder()
        .with_executor(executor)
        .with_config(cli.harvest_config())
        .with_backoff(cli.backoff_config())
        .with_store(JsonlStore::new(&cli.output))
        .build()
        .context("Invalid harvest configuration")?;

    info!(
        endpoint = %cli.endpoint,
        school_id = cli.school_id,
        max = ?harvester.config().effective_max(),
        "Starting harvest"
    );

    let outcome = harvester.run().await.context("Harvest failed")?;

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&outcome.report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    print_summary(&outcome.records, &outcome.report, &cli.output);
    Ok(())
}
