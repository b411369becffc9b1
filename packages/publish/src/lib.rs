#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report publishing stage.
//!
//! Stamps an [`AggregationResult`] with its generation time and writes the
//! resulting [`Report`] twice into the run's day folder: once under a
//! date-stamped name and once under the fixed `latest_report.json` alias.
//! Both objects receive the same bytes.
//!
//! The [`reader`] module is the read side of the same layout.

pub mod reader;

use chrono::{DateTime, Utc};
use incident_etl_models::{AggregationResult, ConfigError, EtlConfig, Report, RunDate, layout};
use incident_etl_store::{ObjectStore, StoreError};

/// Errors that can occur while publishing a report.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Required configuration was missing.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An upload failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The report could not be serialized.
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Publishes `summary` for the run named by the `run_date` token, stamped
/// with the current time.
///
/// Returns the key of the date-stamped report.
///
/// # Errors
///
/// See [`publish_report_at`].
pub async fn publish_report(
    objects: &dyn ObjectStore,
    config: &EtlConfig,
    summary: &AggregationResult,
    run_date: Option<&str>,
) -> Result<String, PublishError> {
    publish_report_at(objects, config, summary, run_date, Utc::now()).await
}

/// Publishes `summary` with an explicit generation time.
///
/// The bucket and the `YYYYMMDD` run date token are validated before
/// anything is written; there is no default date. The dated key is written
/// first, then the alias. The writes are independent: if the second fails
/// the first is left in place.
///
/// # Errors
///
/// * [`PublishError::Config`] if the bucket is not configured or the run
///   date is missing or malformed.
/// * [`PublishError::Serialize`] if the report cannot be encoded.
/// * [`PublishError::Store`] if either upload fails.
pub async fn publish_report_at(
    objects: &dyn ObjectStore,
    config: &EtlConfig,
    summary: &AggregationResult,
    run_date: Option<&str>,
    generated_at: DateTime<Utc>,
) -> Result<String, PublishError> {
    let bucket = config.require_bucket()?;
    let run_date = RunDate::require(run_date)?;

    let report = Report {
        generated_at,
        summary: summary.clone(),
    };
    let body = serde_json::to_vec(&report)?;

    let dated_key = layout::dated_report_key(&run_date);
    let latest_key = layout::latest_report_key(&run_date);

    for key in [&dated_key, &latest_key] {
        objects
            .put_object(bucket, key, body.clone(), Some(layout::JSON_CONTENT_TYPE))
            .await?;
        log::info!("Report written to s3://{bucket}/{key}");
    }

    log::info!(
        "Published report for {run_date} ({} incidents)",
        summary.total_incidents
    );
    Ok(dated_key)
}
