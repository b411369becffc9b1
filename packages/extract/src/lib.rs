#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Snapshot extraction stage.
//!
//! Scans every record of the incident table (following the store's
//! continuation cursor until exhausted), serializes the full set as a single
//! JSON array and writes it to the run's day folder:
//!
//! ```text
//! raw_data/year=YYYY/month=MM/day=DD/incidents_YYYYMMDD.json
//! ```
//!
//! The stage returns the day folder rather than the file key so the
//! aggregator can locate the snapshot by listing.

pub mod progress;

use std::sync::Arc;

use incident_etl_models::layout::{self, DataPath};
use incident_etl_models::{ConfigError, EtlConfig, IncidentRecord, RunDate};
use incident_etl_store::{ObjectStore, RecordStore, StoreError};

use crate::progress::ProgressCallback;

/// Errors that can occur during extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Required configuration was missing.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The record store or object store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The snapshot could not be serialized.
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Extracts every incident into the run's snapshot object.
///
/// Configuration is validated before any I/O. Nothing is written unless the
/// scan completes; a failed write leaves no snapshot behind.
///
/// # Errors
///
/// * [`ExtractError::Config`] if the table or bucket is not configured.
/// * [`ExtractError::Store`] if a scan page or the upload fails.
/// * [`ExtractError::Serialize`] if the records cannot be encoded.
pub async fn extract_snapshot<R>(
    records: &R,
    objects: &dyn ObjectStore,
    config: &EtlConfig,
    run_date: &RunDate,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<DataPath, ExtractError>
where
    R: RecordStore + ?Sized,
{
    let table = config.require_table()?;
    let bucket = config.require_bucket()?;

    log::info!("Scanning table {table}...");
    let incidents = scan_all(records, table, progress).await?;
    log::info!("Extracted {} incidents from {table}", incidents.len());

    let body = serialize_snapshot(&incidents)?;
    let key = layout::snapshot_key(run_date);

    objects
        .put_object(bucket, &key, body, Some(layout::JSON_CONTENT_TYPE))
        .await?;
    log::info!("Snapshot written to s3://{bucket}/{key}");

    Ok(DataPath::for_day(bucket, run_date))
}

/// Reads every record of `table`, one page at a time.
///
/// # Errors
///
/// Returns [`StoreError`] if any page request fails.
pub async fn scan_all<R>(
    records: &R,
    table: &str,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<IncidentRecord>, StoreError>
where
    R: RecordStore + ?Sized,
{
    progress.set_message(format!("Scanning {table}"));

    let mut incidents = Vec::new();
    let mut cursor = None;
    let mut page_num: u32 = 0;

    loop {
        let page = records.scan_page(table, cursor).await?;
        let count = page.items.len() as u64;
        incidents.extend(page.items);
        progress.inc(count);

        log::debug!(
            "[{table}] Page {page_num}: {count} records (total: {})",
            incidents.len()
        );

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }

        page_num += 1;
    }

    progress.finish(format!("{table}: {} records", incidents.len()));
    Ok(incidents)
}

/// Encodes records as a JSON array.
///
/// Non-ASCII text is written as UTF-8, not escaped.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if encoding fails.
pub fn serialize_snapshot(incidents: &[IncidentRecord]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(incidents)
}
