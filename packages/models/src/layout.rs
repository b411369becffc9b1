//! Object-store layout shared by every stage.
//!
//! All artifacts of one run live in a single day folder:
//!
//! ```text
//! raw_data/year=YYYY/month=MM/day=DD/incidents_YYYYMMDD.json
//! raw_data/year=YYYY/month=MM/day=DD/latest_report_YYYYMMDD.json
//! raw_data/year=YYYY/month=MM/day=DD/latest_report.json
//! ```

use crate::RunDate;

/// Root prefix under which every day folder lives.
pub const RAW_DATA_PREFIX: &str = "raw_data/";

/// Marker that identifies a snapshot object by name.
pub const SNAPSHOT_MARKER: &str = "incidents_";

/// Extension shared by snapshots and reports.
pub const JSON_EXTENSION: &str = ".json";

/// Fixed name of the per-day report alias.
pub const LATEST_REPORT_FILE: &str = "latest_report.json";

/// Content type used for every JSON object the job writes.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Day folder for a run, without a trailing slash.
#[must_use]
pub fn day_folder(date: &RunDate) -> String {
    format!(
        "{RAW_DATA_PREFIX}year={}/month={}/day={}",
        date.year(),
        date.month(),
        date.day()
    )
}

/// Key of the raw incident snapshot for a run.
#[must_use]
pub fn snapshot_key(date: &RunDate) -> String {
    format!("{}/{SNAPSHOT_MARKER}{}{JSON_EXTENSION}", day_folder(date), date.token())
}

/// Key of the date-stamped report for a run.
#[must_use]
pub fn dated_report_key(date: &RunDate) -> String {
    format!("{}/latest_report_{}{JSON_EXTENSION}", day_folder(date), date.token())
}

/// Key of the fixed-name report alias in the run's day folder.
#[must_use]
pub fn latest_report_key(date: &RunDate) -> String {
    format!("{}/{LATEST_REPORT_FILE}", day_folder(date))
}

/// Whether `key` names a snapshot object (`…incidents_….json`).
#[must_use]
pub fn is_snapshot_key(key: &str) -> bool {
    key.contains(SNAPSHOT_MARKER) && key.ends_with(JSON_EXTENSION)
}

/// Location of a run's day folder, as handed from the extractor to the
/// aggregator.
///
/// Displays as `s3://<bucket>/<prefix>` when the bucket is known, or as the
/// bare prefix otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath {
    bucket: Option<String>,
    prefix: String,
}

impl DataPath {
    /// The day folder of `date` in `bucket`, with a trailing slash.
    #[must_use]
    pub fn for_day(bucket: &str, date: &RunDate) -> Self {
        Self {
            bucket: Some(bucket.to_string()),
            prefix: format!("{}/", day_folder(date)),
        }
    }

    /// Parses either an `s3://bucket/prefix` URI or a bare key prefix.
    ///
    /// A URI without a path component yields an empty prefix. Leading
    /// slashes are stripped from bare prefixes.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        if let Some(rest) = path.strip_prefix("s3://") {
            let mut parts = rest.splitn(2, '/');
            let bucket = parts.next().filter(|b| !b.is_empty()).map(str::to_string);
            let prefix = parts.next().unwrap_or_default().to_string();
            return Self { bucket, prefix };
        }

        Self {
            bucket: None,
            prefix: path.trim_start_matches('/').to_string(),
        }
    }

    /// Bucket named by the path, if any.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Key prefix inside the bucket.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl std::fmt::Display for DataPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.bucket {
            Some(bucket) => write!(f, "s3://{bucket}/{}", self.prefix),
            None => f.write_str(&self.prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> RunDate {
        RunDate::parse("20251103").unwrap()
    }

    #[test]
    fn builds_partitioned_keys() {
        let date = date();
        assert_eq!(day_folder(&date), "raw_data/year=2025/month=11/day=03");
        assert_eq!(
            snapshot_key(&date),
            "raw_data/year=2025/month=11/day=03/incidents_20251103.json"
        );
        assert_eq!(
            dated_report_key(&date),
            "raw_data/year=2025/month=11/day=03/latest_report_20251103.json"
        );
        assert_eq!(
            latest_report_key(&date),
            "raw_data/year=2025/month=11/day=03/latest_report.json"
        );
    }

    #[test]
    fn recognizes_snapshot_keys() {
        assert!(is_snapshot_key(&snapshot_key(&date())));
        assert!(!is_snapshot_key(&dated_report_key(&date())));
        assert!(!is_snapshot_key("raw_data/incidents_20251103.json.gz"));
    }

    #[test]
    fn data_path_round_trips_through_display() {
        let path = DataPath::for_day("analytics", &date());
        let rendered = path.to_string();
        assert_eq!(rendered, "s3://analytics/raw_data/year=2025/month=11/day=03/");
        assert_eq!(DataPath::parse(&rendered), path);
    }

    #[test]
    fn data_path_accepts_bare_prefixes() {
        let path = DataPath::parse("/raw_data/year=2025/");
        assert_eq!(path.bucket(), None);
        assert_eq!(path.prefix(), "raw_data/year=2025/");
    }

    #[test]
    fn data_path_without_key_has_empty_prefix() {
        let path = DataPath::parse("s3://analytics");
        assert_eq!(path.bucket(), Some("analytics"));
        assert_eq!(path.prefix(), "");
    }
}
