//! Read side of the report layout.
//!
//! Resolves a run date (given, or inferred from the newest snapshot in the
//! bucket) and a [`ReportFile`] to a stored object, then returns its body.

use incident_etl_models::{ConfigError, EtlConfig, ReportFile, RunDate, layout};
use incident_etl_store::{ObjectStore, StoreError, list_all_keys};
use regex::Regex;
use serde_json::Value;

/// Page size used while scanning the bucket for the newest snapshot.
pub const LISTING_PAGE_SIZE: usize = 1000;

/// Errors that can occur while fetching a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportReadError {
    /// Required configuration was missing.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The object store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No run date was given and no snapshot exists to infer one from.
    #[error("No reports available in s3://{bucket}/{}", layout::RAW_DATA_PREFIX)]
    NoReports {
        /// Bucket searched.
        bucket: String,
    },

    /// The requested document does not exist for the run date.
    #[error("No {file} document found for {date}")]
    NotFound {
        /// Document kind requested.
        file: ReportFile,
        /// Run date requested.
        date: RunDate,
    },
}

/// Body of a fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedBody {
    /// The object parsed as JSON.
    Json(Value),
    /// The object did not parse as JSON and is returned verbatim.
    Text(String),
}

/// A fetched report together with the key it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedReport {
    /// Key the body was read from; the alias key when the dated report is absent.
    pub key: String,
    /// Parsed or verbatim object contents.
    pub body: FetchedBody,
}

impl FetchedReport {
    /// Renders the report for output.
    ///
    /// JSON bodies are wrapped as `{"key": …, "data": …}`; text bodies are
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the JSON body cannot be encoded.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        match &self.body {
            FetchedBody::Json(data) => serde_json::to_string_pretty(&serde_json::json!({
                "key": self.key,
                "data": data,
            })),
            FetchedBody::Text(text) => Ok(text.clone()),
        }
    }
}

/// Fetches the `file` document for `date`, or for the newest run found in
/// the bucket when `date` is `None`.
///
/// # Errors
///
/// * [`ReportReadError::Config`] if the bucket is not configured.
/// * [`ReportReadError::NoReports`] if no date was given and the bucket
///   holds no snapshot.
/// * [`ReportReadError::NotFound`] if the document does not exist.
/// * [`ReportReadError::Store`] if listing or reading fails.
pub async fn fetch_report(
    objects: &dyn ObjectStore,
    config: &EtlConfig,
    date: Option<RunDate>,
    file: ReportFile,
) -> Result<FetchedReport, ReportReadError> {
    let bucket = config.require_bucket()?;

    let date = match date {
        Some(date) => date,
        None => {
            log::info!("No date given, looking for the newest snapshot");
            let inferred = latest_snapshot_date(objects, bucket)
                .await?
                .ok_or_else(|| ReportReadError::NoReports {
                    bucket: bucket.to_string(),
                })?;
            log::info!("Inferred run date {inferred}");
            inferred
        }
    };

    let key = resolve_key(objects, bucket, date, file).await?;

    log::info!("Reading s3://{bucket}/{key}");
    let bytes = objects.get_object(bucket, &key).await?;

    Ok(FetchedReport {
        key,
        body: decode_body(&bytes),
    })
}

async fn resolve_key(
    objects: &dyn ObjectStore,
    bucket: &str,
    date: RunDate,
    file: ReportFile,
) -> Result<String, ReportReadError> {
    let candidates = match file {
        ReportFile::Raw => vec![layout::snapshot_key(&date)],
        ReportFile::Summary => vec![
            layout::dated_report_key(&date),
            layout::latest_report_key(&date),
        ],
    };

    for key in candidates {
        if objects.head_object(bucket, &key).await? {
            return Ok(key);
        }
        log::debug!("s3://{bucket}/{key} does not exist");
    }

    log::warn!("No {file} document for {date} in s3://{bucket}");
    Err(ReportReadError::NotFound { file, date })
}

/// Finds the newest run date among the snapshot keys under `raw_data/`.
///
/// Keys whose embedded token is not a real calendar date are skipped.
///
/// # Errors
///
/// Returns [`StoreError`] if any listing page fails.
pub async fn latest_snapshot_date(
    objects: &dyn ObjectStore,
    bucket: &str,
) -> Result<Option<RunDate>, StoreError> {
    let keys = list_all_keys(objects, bucket, layout::RAW_DATA_PREFIX, LISTING_PAGE_SIZE).await?;
    Ok(newest_snapshot_date(&keys))
}

/// Newest run date embedded in `incidents_YYYYMMDD.json` keys.
#[must_use]
pub fn newest_snapshot_date(keys: &[String]) -> Option<RunDate> {
    let re = Regex::new(r"incidents_([0-9]{8})\.json").unwrap_or_else(|_| unreachable!());

    keys.iter()
        .filter_map(|key| re.captures(key))
        .filter_map(|caps| match RunDate::parse(&caps[1]) {
            Ok(date) => Some(date),
            Err(e) => {
                log::debug!("Skipping snapshot key: {e}");
                None
            }
        })
        .max()
}

fn decode_body(bytes: &[u8]) -> FetchedBody {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        return FetchedBody::Json(value);
    }

    log::warn!("Object is not valid JSON, returning raw text");
    FetchedBody::Text(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use incident_etl_store::memory::MemoryObjectStore;
    use serde_json::json;

    use super::*;

    const BUCKET: &str = "analytics";

    fn date(token: &str) -> RunDate {
        RunDate::parse(token).unwrap()
    }

    fn config() -> EtlConfig {
        EtlConfig::new("incidents", BUCKET)
    }

    #[test]
    fn newest_date_picks_greatest_token() {
        let keys = vec![
            "raw_data/year=2025/month=10/day=31/incidents_20251031.json".to_string(),
            "raw_data/year=2025/month=11/day=02/incidents_20251102.json".to_string(),
            "raw_data/year=2025/month=11/day=02/latest_report.json".to_string(),
            "raw_data/year=2025/month=11/day=05/incidents_20251199.json".to_string(),
            "raw_data/year=2024/month=12/day=31/incidents_20241231.json".to_string(),
        ];

        assert_eq!(newest_snapshot_date(&keys), Some(date("20251102")));
        assert_eq!(newest_snapshot_date(&[]), None);
    }

    #[tokio::test]
    async fn infers_date_across_listing_pages() {
        let store = MemoryObjectStore::new();
        for day in 1..=28 {
            let d = date(&format!("202502{day:02}"));
            store.insert(BUCKET, &layout::snapshot_key(&d), b"[]".to_vec());
        }

        let objects: &dyn ObjectStore = &store;
        let keys = list_all_keys(objects, BUCKET, layout::RAW_DATA_PREFIX, 5)
            .await
            .unwrap();
        assert_eq!(keys.len(), 28);
        assert_eq!(newest_snapshot_date(&keys), Some(date("20250228")));
    }

    #[tokio::test]
    async fn summary_prefers_dated_report() {
        let store = MemoryObjectStore::new();
        let d = date("20251103");
        store.insert(BUCKET, &layout::dated_report_key(&d), br#"{"v":"dated"}"#.to_vec());
        store.insert(BUCKET, &layout::latest_report_key(&d), br#"{"v":"alias"}"#.to_vec());

        let report = fetch_report(&store, &config(), Some(d), ReportFile::Summary)
            .await
            .unwrap();

        assert_eq!(report.key, layout::dated_report_key(&d));
        assert_eq!(report.body, FetchedBody::Json(json!({ "v": "dated" })));
    }

    #[tokio::test]
    async fn summary_falls_back_to_alias() {
        let store = MemoryObjectStore::new();
        let d = date("20251103");
        store.insert(BUCKET, &layout::latest_report_key(&d), br#"{"v":"alias"}"#.to_vec());

        let report = fetch_report(&store, &config(), Some(d), ReportFile::Summary)
            .await
            .unwrap();

        assert_eq!(report.key, layout::latest_report_key(&d));
    }

    #[tokio::test]
    async fn missing_summary_is_not_found() {
        let store = MemoryObjectStore::new();
        let d = date("20251103");
        store.insert(BUCKET, &layout::snapshot_key(&d), b"[]".to_vec());

        let err = fetch_report(&store, &config(), Some(d), ReportFile::Summary)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReportReadError::NotFound {
                file: ReportFile::Summary,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn raw_uses_inferred_date() {
        let store = MemoryObjectStore::new();
        store.insert(BUCKET, &layout::snapshot_key(&date("20251101")), b"[1]".to_vec());
        store.insert(BUCKET, &layout::snapshot_key(&date("20251103")), b"[1,2]".to_vec());

        let report = fetch_report(&store, &config(), None, ReportFile::Raw)
            .await
            .unwrap();

        assert_eq!(report.key, layout::snapshot_key(&date("20251103")));
        assert_eq!(report.body, FetchedBody::Json(json!([1, 2])));
    }

    #[tokio::test]
    async fn empty_bucket_has_no_reports() {
        let store = MemoryObjectStore::new();

        let err = fetch_report(&store, &config(), None, ReportFile::Summary)
            .await
            .unwrap_err();

        assert!(matches!(err, ReportReadError::NoReports { .. }));
    }

    #[tokio::test]
    async fn non_json_body_is_returned_as_text() {
        let store = MemoryObjectStore::new();
        let d = date("20251103");
        store.insert(BUCKET, &layout::snapshot_key(&d), b"not json".to_vec());

        let report = fetch_report(&store, &config(), Some(d), ReportFile::Raw)
            .await
            .unwrap();

        assert_eq!(report.body, FetchedBody::Text("not json".to_string()));
        assert_eq!(report.render().unwrap(), "not json");
    }

    #[test]
    fn json_body_renders_with_key() {
        let report = FetchedReport {
            key: "k".to_string(),
            body: FetchedBody::Json(json!({ "total": 1 })),
        };

        let rendered: Value = serde_json::from_str(&report.render().unwrap()).unwrap();
        assert_eq!(rendered, json!({ "key": "k", "data": { "total": 1 } }));
    }
}
