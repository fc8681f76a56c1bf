//! CLI entry point for the passenger enrichment pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use passenger_enrichment::aggregate::{count_by_class_survival, count_by_title, country_rows};
use passenger_enrichment::{
    AggregationResult, CleaningReport, CountryCount, NameParseError, Pipeline, PipelineBuilder,
    PipelineConfig, PipelineOutput, ResolutionReport, Sex, TitleCount, filter_and_aggregate,
    write_enriched_csv,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[cfg(feature = "namsor")]
use passenger_enrichment::nationality::{API_KEY_ENV, NamsorConfig, NamsorProvider};
#[cfg(feature = "namsor")]
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Passenger dataset cleaning and surname nationality enrichment",
    long_about = "Cleans a passenger CSV, infers a country of origin per surname and prints \
                  grouped views.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  NAMSOR_API_KEY    API key for the nationality service\n\n\
                  EXAMPLES:\n  \
                  # Resolve up to 450 new surnames and print the summary\n  \
                  passenger-enrichment -i titanic.csv\n\n  \
                  # Only use the cached surname table\n  \
                  passenger-enrichment -i titanic.csv --offline\n\n  \
                  # Sex/survival view for US passengers, as JSON\n  \
                  passenger-enrichment -i titanic.csv --country US --json"
)]
struct Args {
    /// Path to the passenger CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Surname -> country table (read as cache, rewritten after resolution)
    #[arg(long, default_value = passenger_enrichment::config::DEFAULT_SURNAME_TABLE)]
    table: PathBuf,

    /// Maximum number of new surnames looked up in this run
    #[arg(long, default_value_t = passenger_enrichment::config::DEFAULT_MAX_SURNAMES)]
    max_surnames: usize,

    /// Number of lookups in flight at once
    #[arg(long, default_value_t = passenger_enrichment::config::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Ignore the cached table and resolve every surname again
    #[arg(long)]
    refresh: bool,

    /// Do not contact the nationality service
    #[arg(long)]
    offline: bool,

    /// Restrict the sex/survival view to one country code (exact match)
    #[arg(long)]
    country: Option<String>,

    /// Number of titles in the title view
    #[arg(long, default_value_t = passenger_enrichment::config::DEFAULT_TOP_TITLES)]
    top_titles: usize,

    /// Write the enriched dataset to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logs; only the final JSON report is written.
    #[arg(long)]
    json: bool,
}

/// Everything the CLI prints in `--json` mode.
#[derive(Serialize)]
struct EnrichmentReport<'a> {
    generated_at: String,
    input_file: String,
    passengers: usize,
    cleaning: &'a CleaningReport,
    resolution: &'a ResolutionReport,
    parse_errors: &'a [NameParseError],
    by_country: Vec<CountryCount>,
    by_class_survival: AggregationResult<(u8, bool)>,
    country_filter: Option<&'a str>,
    by_sex_survival: AggregationResult<(Sex, bool)>,
    top_titles: Vec<TitleCount>,
}

impl<'a> EnrichmentReport<'a> {
    fn build(output: &'a PipelineOutput, args: &'a Args, top_titles: usize) -> Self {
        let dataset = &output.dataset;
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            input_file: args.input.display().to_string(),
            passengers: dataset.len(),
            cleaning: &output.cleaning,
            resolution: &output.resolution,
            parse_errors: &output.parse_errors,
            by_country: country_rows(dataset),
            by_class_survival: count_by_class_survival(dataset),
            country_filter: args.country.as_deref(),
            by_sex_survival: filter_and_aggregate(dataset, args.country.as_deref()),
            top_titles: count_by_title(dataset, top_titles),
        }
    }
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries
/// the JSON report.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let config = PipelineConfig::builder()
        .surname_table_path(&args.table)
        .max_surnames(args.max_surnames)
        .concurrency(args.concurrency)
        .refresh_surname_table(args.refresh)
        .top_titles(args.top_titles)
        .build()?;

    let pipeline = build_pipeline(&args, config)?;

    let output = match pipeline.run_file(&args.input) {
        Ok(output) => output,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Err(anyhow!("Pipeline failed [{}]: {}", e.error_code(), e));
        }
    };

    if let Some(path) = &args.output {
        write_enriched_csv(&output.dataset, path)?;
        info!("Enriched dataset written to: {}", path.display());
    }

    let report = EnrichmentReport::build(&output, &args, pipeline.config().top_titles);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human_readable_summary(&report);
    }

    Ok(())
}

fn with_progress(args: &Args, builder: PipelineBuilder) -> PipelineBuilder {
    if args.quiet || args.json {
        return builder;
    }
    builder.on_progress(|update| {
        info!(
            "[{:.0}%] {}: {}",
            update.progress * 100.0,
            update.stage.display_name(),
            update.message
        );
    })
}

#[cfg(feature = "namsor")]
fn build_pipeline(args: &Args, config: PipelineConfig) -> Result<Pipeline> {
    let mut builder = with_progress(args, Pipeline::builder().config(config));

    if args.offline {
        info!("Offline mode: using the cached surname table only");
    } else if std::env::var(API_KEY_ENV).is_err() {
        warn!(
            "{} not set. Falling back to the cached surname table.",
            API_KEY_ENV
        );
    } else {
        let namsor_config = NamsorConfig::builder()
            .timeout_secs(args.timeout_secs)
            .build();
        let provider = NamsorProvider::from_env_with_config(namsor_config)?;
        builder = builder.provider(Arc::new(provider));
    }

    Ok(builder.build()?)
}

#[cfg(not(feature = "namsor"))]
fn build_pipeline(args: &Args, config: PipelineConfig) -> Result<Pipeline> {
    if !args.offline {
        warn!("Nationality service support not compiled in. Using the cached surname table.");
        warn!("Compile with --features namsor to enable lookups.");
    }

    Ok(with_progress(args, Pipeline::builder().config(config)).build()?)
}

fn outcome_label(survived: bool) -> &'static str {
    if survived { "survived" } else { "died" }
}

/// Print a human-readable summary of the enrichment results.
fn print_human_readable_summary(report: &EnrichmentReport<'_>) {
    let resolution = report.resolution;

    println!();
    println!("{}", "=".repeat(80));
    println!("ENRICHMENT COMPLETE");
    println!("{}", "=".repeat(80));
    println!();
    println!("Input: {} ({} passengers)", report.input_file, report.passengers);
    println!(
        "Cleaning: {} ages filled, {} ports filled",
        report.cleaning.ages_filled(),
        report.cleaning.embarked_filled
    );
    println!(
        "Surnames: {} distinct, {} cached, {} requested ({} resolved, {} unmatched, {} failed), {} over bound",
        resolution.distinct_surnames,
        resolution.cached,
        resolution.requested,
        resolution.resolved,
        resolution.unmatched,
        resolution.failed,
        resolution.skipped_by_bound
    );
    if !report.parse_errors.is_empty() {
        println!("Name parse errors: {}", report.parse_errors.len());
    }
    println!();

    println!("Passengers by country:");
    for row in report.by_country.iter().take(10) {
        println!(
            "  {:<8} {:<6} {:>5}",
            row.country.as_deref().unwrap_or("(none)"),
            row.alpha3.unwrap_or("-"),
            row.count
        );
    }
    if report.by_country.len() > 10 {
        println!("  ... and {} more countries", report.by_country.len() - 10);
    }
    println!();

    println!("Class x survival:");
    for ((class, survived), count) in report.by_class_survival.iter() {
        println!("  class {} {:<9} {:>5}", class, outcome_label(*survived), count);
    }
    println!();

    match report.country_filter {
        Some(country) => println!("Sex x survival ({}):", country),
        None => println!("Sex x survival (all):"),
    }
    for ((sex, survived), count) in report.by_sex_survival.iter() {
        println!("  {:<7} {:<9} {:>5}", sex.as_str(), outcome_label(*survived), count);
    }
    println!();

    println!("Top titles:");
    for title in &report.top_titles {
        println!("  {:<12} {:>5}", title.title, title.count);
    }
    println!();

    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
