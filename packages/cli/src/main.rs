#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `incident_etl`: the daily incident snapshot and report job.
//!
//! Each stage is exposed as its own subcommand so a scheduler can run and
//! retry them independently; `run` chains all three. Table and bucket come
//! from `INCIDENTS_TABLE` / `ANALYTICS_BUCKET_NAME` unless overridden on the
//! command line. AWS credentials and region follow the standard provider
//! chain.

mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use incident_etl_cli_utils::ScanProgress;
use incident_etl_dynamodb::DynamoRecordStore;
use incident_etl_models::layout::DataPath;
use incident_etl_models::{AggregationResult, EtlConfig, ReportFile, RunDate};
use incident_etl_s3::S3ObjectStore;

#[derive(Parser)]
#[command(name = "incident_etl", about = "Daily incident snapshot, aggregation and report job")]
struct Cli {
    /// Run date as `YYYYMMDD`. Required by `publish`; `extract`,
    /// `aggregate` and `run` default to today (UTC) and `fetch` infers the
    /// newest run.
    #[arg(long, global = true)]
    date: Option<String>,
    /// Incident table name (overrides `INCIDENTS_TABLE`)
    #[arg(long, global = true)]
    table: Option<String>,
    /// Analytics bucket name (overrides `ANALYTICS_BUCKET_NAME`)
    #[arg(long, global = true)]
    bucket: Option<String>,
    /// AWS region (overrides the provider chain)
    #[arg(long, global = true)]
    region: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the incident table into the day's snapshot object
    Extract,
    /// Aggregate a snapshot and print the summary as JSON
    Aggregate {
        /// Day folder to search, as `s3://bucket/prefix` or a bare prefix.
        /// Defaults to the folder of `--date`.
        #[arg(long)]
        data_path: Option<String>,
    },
    /// Publish a summary file produced by `aggregate`
    Publish {
        /// Path to the summary JSON
        #[arg(long)]
        summary: PathBuf,
    },
    /// Extract, aggregate and publish in one go
    Run,
    /// Print a stored report or snapshot
    Fetch {
        /// Which document to read (`summary` or `raw`)
        #[arg(long, default_value_t = ReportFile::Summary)]
        file: ReportFile,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = incident_etl_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = EtlConfig::from_env().with_overrides(cli.table, cli.bucket);
    let date = cli
        .date
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(RunDate::parse)
        .transpose()?;
    let run_date = || date.unwrap_or_else(RunDate::today);

    let objects = S3ObjectStore::from_env(cli.region.clone()).await;

    match cli.command {
        Commands::Extract => {
            let records = DynamoRecordStore::from_env(cli.region).await;
            let progress = ScanProgress::records_spinner(&multi, "Scanning incidents");
            let data_path = incident_etl_extract::extract_snapshot(
                &records,
                &objects,
                &config,
                &run_date(),
                &progress,
            )
            .await?;
            println!("{data_path}");
        }
        Commands::Aggregate { data_path } => {
            let data_path = match data_path {
                Some(path) => path,
                None => DataPath::for_day(config.require_bucket()?, &run_date()).to_string(),
            };
            let summary =
                incident_etl_aggregate::aggregate_snapshot(&objects, &config, &data_path).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Publish { summary } => {
            let contents = tokio::fs::read(&summary).await?;
            let summary: AggregationResult = serde_json::from_slice(&contents)?;
            let key = incident_etl_publish::publish_report(
                &objects,
                &config,
                &summary,
                cli.date.as_deref(),
            )
            .await?;
            println!("{key}");
        }
        Commands::Run => {
            let records = DynamoRecordStore::from_env(cli.region).await;
            let progress = ScanProgress::records_spinner(&multi, "Scanning incidents");
            let outcome =
                pipeline::run(&records, &objects, &config, &run_date(), &progress).await?;
            log::info!(
                "{} incidents from {} summarized",
                outcome.summary.total_incidents,
                outcome.data_path
            );
            println!("{}", outcome.report_key);
        }
        Commands::Fetch { file } => {
            let report =
                incident_etl_publish::reader::fetch_report(&objects, &config, date, file).await?;
            println!("{}", report.render()?);
        }
    }

    Ok(())
}
