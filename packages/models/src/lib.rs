#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the daily incident ETL.
//!
//! Every stage (extract, aggregate, publish) and every store adapter agrees
//! on the types in this crate: the [`RunDate`] supplied by the scheduler,
//! the date-partitioned object layout in [`layout`], the explicit
//! [`EtlConfig`], and the serialized [`AggregationResult`] / [`Report`]
//! documents that downstream consumers read.

pub mod config;
pub mod layout;
pub mod run_date;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use config::{ConfigError, EtlConfig};
pub use run_date::RunDate;

/// A single incident record as stored in the snapshot: a loosely
/// structured JSON object with no enforced schema.
pub type IncidentRecord = serde_json::Map<String, serde_json::Value>;

/// A location label paired with the number of incidents carrying it.
///
/// Serializes as a two-element JSON array (`["label", 3]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCount(pub String, pub u64);

impl LocationCount {
    /// The location label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.0
    }

    /// Number of incidents at this location.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.1
    }
}

/// Grouped counts computed from one snapshot.
///
/// Every frequency mapping sums to [`Self::total_incidents`]: each incident
/// lands in exactly one bucket per dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Object key of the snapshot the counts were computed from.
    pub source_key: String,
    /// Number of records in the snapshot.
    pub total_incidents: u64,
    /// Incidents per category label.
    pub by_categoria: BTreeMap<String, u64>,
    /// Incidents per urgency label.
    pub by_urgencia: BTreeMap<String, u64>,
    /// Incidents per status label.
    pub by_estado: BTreeMap<String, u64>,
    /// Incidents per location label.
    pub by_ubicacion: BTreeMap<String, u64>,
    /// Up to 20 most frequent locations, most frequent first.
    pub top_locations: Vec<LocationCount>,
    /// Incidents per creation hour (`"00"`-`"23"`, plus `"unknown"`).
    pub incidents_per_hour: BTreeMap<String, u64>,
}

/// The published artifact: an aggregation result stamped with the time it
/// was generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// When the report was generated (UTC).
    pub generated_at: DateTime<Utc>,
    /// The aggregation the report wraps.
    pub summary: AggregationResult,
}

/// Which stored document a report lookup should return.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReportFile {
    /// The published summary report.
    #[default]
    Summary,
    /// The raw incident snapshot.
    Raw,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_count_serializes_as_pair() {
        let entry = LocationCount("Av. Perú".to_string(), 3);
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"["Av. Perú",3]"#);
    }

    #[test]
    fn report_serializes_generated_at_as_utc() {
        let generated_at = DateTime::parse_from_rfc3339("2025-11-03T02:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let report = Report {
            generated_at,
            summary: AggregationResult::default(),
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["generated_at"], "2025-11-03T02:00:00Z");
        assert_eq!(value["summary"]["total_incidents"], 0);
        assert!(value["summary"]["top_locations"].as_array().unwrap().is_empty());
    }

    #[test]
    fn report_file_parses_case_insensitively() {
        assert_eq!("raw".parse::<ReportFile>().unwrap(), ReportFile::Raw);
        assert_eq!("SUMMARY".parse::<ReportFile>().unwrap(), ReportFile::Summary);
        assert!("both".parse::<ReportFile>().is_err());
        assert_eq!(ReportFile::default(), ReportFile::Summary);
    }
}
