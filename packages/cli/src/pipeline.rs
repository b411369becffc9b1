//! Full daily run: extract -> aggregate -> publish.
//!
//! Each stage hands its output to the next. The first failing stage aborts
//! the run; earlier artifacts stay in place.

use std::sync::Arc;
use std::time::Instant;

use incident_etl_aggregate::AggregateError;
use incident_etl_extract::ExtractError;
use incident_etl_extract::progress::ProgressCallback;
use incident_etl_models::layout::DataPath;
use incident_etl_models::{AggregationResult, EtlConfig, RunDate};
use incident_etl_publish::PublishError;
use incident_etl_store::{ObjectStore, RecordStore};

/// The stage that stopped a run, with its error.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Scanning the table or uploading the snapshot failed.
    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),
    /// Locating or reading the snapshot failed.
    #[error("Aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),
    /// Writing the dated report or its alias failed.
    #[error("Publishing failed: {0}")]
    Publish(#[from] PublishError),
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Day folder the snapshot was written to.
    pub data_path: DataPath,
    /// Aggregation of that snapshot.
    pub summary: AggregationResult,
    /// Key of the date-stamped report.
    pub report_key: String,
}

/// Extracts, aggregates and publishes for `run_date`.
///
/// # Errors
///
/// Returns the [`PipelineError`] of the first stage that fails. Objects
/// written by earlier stages are left in place.
pub async fn run<R>(
    records: &R,
    objects: &dyn ObjectStore,
    config: &EtlConfig,
    run_date: &RunDate,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<RunOutcome, PipelineError>
where
    R: RecordStore + ?Sized,
{
    let start = Instant::now();
    log::info!("Starting run for {run_date}");

    log::info!("[1/3] Extracting snapshot...");
    let data_path =
        incident_etl_extract::extract_snapshot(records, objects, config, run_date, progress)
            .await?;

    log::info!("[2/3] Aggregating {data_path}...");
    let summary =
        incident_etl_aggregate::aggregate_snapshot(objects, config, &data_path.to_string())
            .await?;

    log::info!("[3/3] Publishing report...");
    let token = run_date.token();
    let report_key =
        incident_etl_publish::publish_report(objects, config, &summary, Some(&token)).await?;

    log::info!(
        "Run for {run_date} complete in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(RunOutcome {
        data_path,
        summary,
        report_key,
    })
}

#[cfg(test)]
mod tests {
    use incident_etl_extract::progress::null_progress;
    use incident_etl_models::{IncidentRecord, Report, layout};
    use incident_etl_store::memory::{MemoryObjectStore, MemoryRecordStore};
    use serde_json::json;

    use super::*;

    fn record(value: &serde_json::Value) -> IncidentRecord {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn runs_all_three_stages() {
        let records = MemoryRecordStore::new().with_page_size(2).with_table(
            "incidents",
            vec![
                record(&json!({ "categoria": "fuga", "urgencia": "alta", "ubicacion": { "nombre": "Biblioteca" }, "createdAt": "2025-11-03T14:22:00Z" })),
                record(&json!({ "category": "fuga", "status": "resuelto", "ubicacion": "Biblioteca" })),
                record(&json!({ "categoria": "limpieza", "ubicacion": { "lat": -12.05, "lng": -77.04 } })),
            ],
        );
        let objects = MemoryObjectStore::new();
        let config = EtlConfig::new("incidents", "analytics");
        let date = RunDate::parse("20251103").unwrap();

        let outcome = run(&records, &objects, &config, &date, &null_progress())
            .await
            .unwrap();

        assert_eq!(outcome.summary.total_incidents, 3);
        assert_eq!(outcome.summary.source_key, layout::snapshot_key(&date));
        assert_eq!(outcome.report_key, layout::dated_report_key(&date));
        assert_eq!(outcome.summary.top_locations[0].label(), "Biblioteca");
        assert_eq!(outcome.summary.top_locations[0].count(), 2);

        let keys = objects.keys("analytics");
        assert_eq!(keys.len(), 3);

        let dated = objects.object("analytics", &outcome.report_key).unwrap();
        let alias = objects
            .object("analytics", &layout::latest_report_key(&date))
            .unwrap();
        assert_eq!(dated.body, alias.body);

        let report: Report = serde_json::from_slice(&dated.body).unwrap();
        assert_eq!(report.summary, outcome.summary);
        assert_eq!(report.summary.incidents_per_hour.get("14"), Some(&1));
    }

    #[tokio::test]
    async fn extraction_failure_stops_the_run() {
        let records = MemoryRecordStore::new();
        let objects = MemoryObjectStore::new();
        let config = EtlConfig::new("incidents", "analytics");
        let date = RunDate::parse("20251103").unwrap();

        let err = run(&records, &objects, &config, &date, &null_progress())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Extract(_)));
        assert_eq!(objects.put_calls(), 0);
        assert_eq!(objects.list_calls(), 0);
    }

    #[tokio::test]
    async fn report_is_published_under_the_run_date() {
        let records = MemoryRecordStore::new().with_table(
            "incidents",
            vec![record(&json!({ "categoria": "fuga" }))],
        );
        let objects = MemoryObjectStore::new();
        let config = EtlConfig::new("incidents", "analytics");
        let date = RunDate::parse("20240229").unwrap();

        let outcome = run(&records, &objects, &config, &date, &null_progress())
            .await
            .unwrap();

        assert_eq!(
            outcome.report_key,
            "raw_data/year=2024/month=02/day=29/latest_report_20240229.json"
        );
        assert!(
            objects
                .object("analytics", "raw_data/year=2024/month=02/day=29/latest_report.json")
                .is_some()
        );
    }
}
