#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation stage.
//!
//! Locates the day's snapshot under the folder handed over by the
//! extractor, loads it, and computes in a single in-memory pass:
//!
//! * the total number of incidents,
//! * counts per category, urgency, status and location,
//! * the 20 most frequent locations,
//! * an hour-of-day histogram of creation times.
//!
//! Normalization rules live in [`normalize`]. A snapshot that is not a JSON
//! array is logged and treated as empty, so the run still publishes a
//! (zero-total) report.

pub mod normalize;
pub mod tally;

use incident_etl_models::layout::{self, DataPath};
use incident_etl_models::{AggregationResult, ConfigError, EtlConfig, IncidentRecord};
use incident_etl_store::{ObjectStore, StoreError};
use serde_json::Value;

use crate::normalize::normalize;
use crate::tally::Tally;

/// Maximum number of keys inspected per snapshot search.
pub const SNAPSHOT_LIST_LIMIT: usize = 100;

/// Number of entries in the top-locations ranking.
pub const TOP_LOCATIONS: usize = 20;

/// Errors that can occur during aggregation.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Required configuration was missing.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The object store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No snapshot was found under the day folder or the `raw_data/` root.
    #[error("No incidents_*.json snapshot found under s3://{bucket}/{prefix}")]
    SnapshotNotFound {
        /// Bucket searched.
        bucket: String,
        /// Prefix searched first.
        prefix: String,
    },
}

/// Aggregates the snapshot found under `data_path`.
///
/// `data_path` is the folder returned by the extractor, either as an
/// `s3://bucket/prefix` URI or as a bare prefix. Objects are always read
/// from the configured bucket.
///
/// # Errors
///
/// * [`AggregateError::Config`] if the bucket is not configured.
/// * [`AggregateError::SnapshotNotFound`] if no snapshot can be located.
/// * [`AggregateError::Store`] if listing or reading fails.
pub async fn aggregate_snapshot(
    objects: &dyn ObjectStore,
    config: &EtlConfig,
    data_path: &str,
) -> Result<AggregationResult, AggregateError> {
    let bucket = config.require_bucket()?;
    let path = DataPath::parse(data_path);

    if let Some(named) = path.bucket()
        && named != bucket
    {
        log::warn!("Data path {path} names bucket {named}, reading from {bucket} instead");
    }

    let key = locate_snapshot(objects, bucket, path.prefix()).await?;
    log::info!("Reading snapshot s3://{bucket}/{key}");

    let body = objects.get_object(bucket, &key).await?;
    let incidents = parse_snapshot(&body);
    let result = aggregate_records(&key, &incidents);

    log::info!(
        "Aggregation complete: {} incidents from {key}",
        result.total_incidents
    );
    Ok(result)
}

/// Finds the snapshot key for a day folder.
///
/// Picks the first listed key under `prefix` that looks like a snapshot.
/// When there is none, repeats the search under the `raw_data/` root, which
/// may return a snapshot from another day.
///
/// # Errors
///
/// Returns [`AggregateError::SnapshotNotFound`] if both searches come up
/// empty, or [`AggregateError::Store`] if a listing fails.
pub async fn locate_snapshot(
    objects: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<String, AggregateError> {
    if let Some(key) = first_snapshot_key(objects, bucket, prefix).await? {
        return Ok(key);
    }

    log::warn!(
        "No snapshot under s3://{bucket}/{prefix}, searching s3://{bucket}/{}",
        layout::RAW_DATA_PREFIX
    );

    if let Some(key) = first_snapshot_key(objects, bucket, layout::RAW_DATA_PREFIX).await? {
        log::warn!("Using fallback snapshot {key}, which may belong to a different day");
        return Ok(key);
    }

    Err(AggregateError::SnapshotNotFound {
        bucket: bucket.to_string(),
        prefix: prefix.to_string(),
    })
}

async fn first_snapshot_key(
    objects: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<Option<String>, StoreError> {
    let listing = objects
        .list_objects(bucket, prefix, SNAPSHOT_LIST_LIMIT, None)
        .await?;

    Ok(listing
        .keys
        .into_iter()
        .find(|key| layout::is_snapshot_key(key)))
}

/// Decodes a snapshot body, degrading to no incidents when it is not a JSON
/// array.
#[must_use]
pub fn parse_snapshot(body: &[u8]) -> Vec<Value> {
    match serde_json::from_slice::<Vec<Value>>(body) {
        Ok(incidents) => incidents,
        Err(e) => {
            log::error!("Failed to parse snapshot JSON, continuing with no incidents: {e}");
            Vec::new()
        }
    }
}

/// Computes the aggregation over already-loaded incidents.
///
/// Elements that are not JSON objects are still counted, with every
/// dimension at its default label.
#[must_use]
pub fn aggregate_records(source_key: &str, incidents: &[Value]) -> AggregationResult {
    let empty = IncidentRecord::new();

    let mut by_categoria = Tally::new();
    let mut by_urgencia = Tally::new();
    let mut by_estado = Tally::new();
    let mut by_ubicacion = Tally::new();
    let mut per_hour = Tally::new();

    for incident in incidents {
        let record = incident.as_object().unwrap_or(&empty);
        let normalized = normalize(record);

        by_categoria.add(normalized.category);
        by_urgencia.add(normalized.urgency);
        by_estado.add(normalized.status);
        by_ubicacion.add(normalized.location);
        per_hour.add(normalized.hour.to_string());
    }

    AggregationResult {
        source_key: source_key.to_string(),
        total_incidents: incidents.len() as u64,
        by_categoria: by_categoria.into_map(),
        by_urgencia: by_urgencia.into_map(),
        by_estado: by_estado.into_map(),
        top_locations: by_ubicacion.most_common(TOP_LOCATIONS),
        by_ubicacion: by_ubicacion.into_map(),
        incidents_per_hour: per_hour.into_map(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use incident_etl_models::RunDate;
    use incident_etl_store::memory::MemoryObjectStore;
    use serde_json::json;

    use super::*;

    const BUCKET: &str = "analytics";

    fn counts(entries: &[(&str, u64)]) -> BTreeMap<String, u64> {
        entries.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn seeded_store(date: &str, body: &[u8]) -> (MemoryObjectStore, String) {
        let date = RunDate::parse(date).unwrap();
        let store = MemoryObjectStore::new();
        let key = layout::snapshot_key(&date);
        store.insert(BUCKET, &key, body.to_vec());
        (store, DataPath::for_day(BUCKET, &date).to_string())
    }

    #[test]
    fn aggregates_mixed_alias_records() {
        let incidents = vec![
            json!({ "category": "fuga", "estado": "abierto", "createdAt": "2025-01-01T05:00:00Z" }),
            json!({ "category": "fuga", "status": "closed" }),
        ];

        let result = aggregate_records("k", &incidents);

        assert_eq!(result.total_incidents, 2);
        assert_eq!(result.by_categoria, counts(&[("fuga", 2)]));
        assert_eq!(result.by_estado, counts(&[("abierto", 1), ("closed", 1)]));
        assert_eq!(result.by_urgencia, counts(&[("medio", 2)]));
        assert_eq!(result.incidents_per_hour, counts(&[("05", 1), ("unknown", 1)]));
        assert_eq!(result.by_ubicacion, counts(&[("sin_ubicacion", 2)]));
    }

    #[test]
    fn empty_snapshot_yields_empty_result() {
        let result = aggregate_records("k", &[]);

        assert_eq!(result.total_incidents, 0);
        assert!(result.by_categoria.is_empty());
        assert!(result.by_urgencia.is_empty());
        assert!(result.by_estado.is_empty());
        assert!(result.by_ubicacion.is_empty());
        assert!(result.top_locations.is_empty());
        assert!(result.incidents_per_hour.is_empty());
    }

    #[test]
    fn every_mapping_sums_to_total() {
        let incidents: Vec<Value> = (0..57)
            .map(|i| match i % 4 {
                0 => json!({ "categoria": format!("c{}", i % 5), "ubicacion": { "nombre": format!("n{}", i % 7) } }),
                1 => json!({ "urgency": "alta", "createdAt": format!("2025-03-01T{:02}:00:00Z", i % 24) }),
                2 => json!("not an object"),
                _ => json!({ "ubicacion": { "lat": i, "lng": -i }, "createdAt": "garbage" }),
            })
            .collect();

        let result = aggregate_records("k", &incidents);
        let total = result.total_incidents;

        assert_eq!(total, 57);
        for mapping in [
            &result.by_categoria,
            &result.by_urgencia,
            &result.by_estado,
            &result.by_ubicacion,
            &result.incidents_per_hour,
        ] {
            assert_eq!(mapping.values().sum::<u64>(), total);
        }
    }

    #[test]
    fn top_locations_are_capped_and_descending() {
        let mut incidents = Vec::new();
        for i in 0..25_u64 {
            for _ in 0..=(i % 4) {
                incidents.push(json!({ "ubicacion": format!("loc{i}") }));
            }
        }

        let result = aggregate_records("k", &incidents);

        assert_eq!(result.by_ubicacion.len(), 25);
        assert_eq!(result.top_locations.len(), TOP_LOCATIONS);
        assert!(
            result
                .top_locations
                .windows(2)
                .all(|w| w[0].count() >= w[1].count())
        );
        assert_eq!(result.top_locations[0].label(), "loc3");
    }

    #[test]
    fn top_locations_shorter_than_cap_when_few_labels() {
        let incidents = vec![
            json!({ "ubicacion": "B" }),
            json!({ "ubicacion": "A" }),
            json!({ "ubicacion": "A" }),
        ];

        let result = aggregate_records("k", &incidents);
        let labels: Vec<(&str, u64)> = result
            .top_locations
            .iter()
            .map(|l| (l.label(), l.count()))
            .collect();
        assert_eq!(labels, vec![("A", 2), ("B", 1)]);
    }

    #[test]
    fn malformed_body_degrades_to_no_incidents() {
        assert!(parse_snapshot(b"this is not json").is_empty());
        assert!(parse_snapshot(br#"{"not": "an array"}"#).is_empty());
        assert_eq!(parse_snapshot(b"[{}, 1]").len(), 2);
    }

    #[tokio::test]
    async fn aggregates_snapshot_under_day_folder() {
        let body = serde_json::to_vec(&json!([
            { "categoria": "robo", "ubicacion": { "nombre": "Pabellón Ñ" } },
            { "categoria": "robo" },
        ]))
        .unwrap();
        let (store, data_path) = seeded_store("20251103", &body);
        let config = EtlConfig::new("incidents", BUCKET);

        let result = aggregate_snapshot(&store, &config, &data_path)
            .await
            .unwrap();

        assert_eq!(
            result.source_key,
            "raw_data/year=2025/month=11/day=03/incidents_20251103.json"
        );
        assert_eq!(result.total_incidents, 2);
        assert_eq!(result.by_categoria, counts(&[("robo", 2)]));
        assert_eq!(result.top_locations[0].label(), "Pabellón Ñ");
    }

    #[tokio::test]
    async fn malformed_snapshot_returns_zero_total() {
        let (store, data_path) = seeded_store("20251103", b"<html>oops</html>");
        let config = EtlConfig::new("incidents", BUCKET);

        let result = aggregate_snapshot(&store, &config, &data_path)
            .await
            .unwrap();

        assert_eq!(result.total_incidents, 0);
        assert!(result.by_categoria.is_empty());
        assert!(result.top_locations.is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_raw_data_root() {
        let (store, _) = seeded_store("20251101", b"[{}]");
        let config = EtlConfig::new("incidents", BUCKET);
        let today = DataPath::for_day(BUCKET, &RunDate::parse("20251103").unwrap());

        let result = aggregate_snapshot(&store, &config, &today.to_string())
            .await
            .unwrap();

        assert_eq!(
            result.source_key,
            "raw_data/year=2025/month=11/day=01/incidents_20251101.json"
        );
        assert_eq!(result.total_incidents, 1);
    }

    #[tokio::test]
    async fn ignores_non_snapshot_objects_in_folder() {
        let date = RunDate::parse("20251103").unwrap();
        let store = MemoryObjectStore::new();
        store.insert(BUCKET, &layout::dated_report_key(&date), b"{}".to_vec());
        store.insert(BUCKET, &layout::snapshot_key(&date), b"[]".to_vec());

        let key = locate_snapshot(&store, BUCKET, &format!("{}/", layout::day_folder(&date)))
            .await
            .unwrap();

        assert_eq!(key, layout::snapshot_key(&date));
    }

    #[tokio::test]
    async fn missing_snapshot_is_not_found() {
        let store = MemoryObjectStore::new();
        store.insert(BUCKET, "raw_data/readme.txt", b"hi".to_vec());
        let config = EtlConfig::new("incidents", BUCKET);

        let err = aggregate_snapshot(&store, &config, "s3://analytics/raw_data/year=2025/")
            .await
            .unwrap_err();

        assert!(matches!(err, AggregateError::SnapshotNotFound { .. }));
        assert_eq!(store.list_calls(), 2);
    }

    #[tokio::test]
    async fn missing_bucket_fails_before_listing() {
        let store = MemoryObjectStore::new();

        let err = aggregate_snapshot(&store, &EtlConfig::default(), "raw_data/")
            .await
            .unwrap_err();

        assert!(matches!(err, AggregateError::Config(_)));
        assert_eq!(store.list_calls(), 0);
    }
}
