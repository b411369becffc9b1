//! Per-incident normalization rules.
//!
//! Each logical attribute is read from an ordered list of candidate field
//! names; the first candidate holding a usable value wins and the
//! attribute's default label is used when none does. Attributes are
//! resolved independently, so a malformed field never affects another.
//!
//! A value is usable when it is not `null`, `false`, `0`, `""`, `[]` or
//! `{}`. Strings are used verbatim; any other value is rendered as its JSON
//! text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike as _};
use incident_etl_models::IncidentRecord;
use serde_json::Value;

/// Candidate fields for the incident category, in priority order.
pub const CATEGORY_FIELDS: &[&str] = &["categoria", "category"];
/// Candidate fields for the incident urgency, in priority order.
pub const URGENCY_FIELDS: &[&str] = &["urgencia", "prioridad", "urgency"];
/// Candidate fields for the incident status, in priority order.
pub const STATUS_FIELDS: &[&str] = &["estado", "status"];
/// Field holding the incident location.
pub const LOCATION_FIELD: &str = "ubicacion";
/// Name sub-field of a structured location.
pub const LOCATION_NAME_FIELD: &str = "nombre";
/// Latitude sub-fields of a structured location, in priority order.
pub const LATITUDE_FIELDS: &[&str] = &["lat", "latitude"];
/// Longitude sub-fields of a structured location, in priority order.
pub const LONGITUDE_FIELDS: &[&str] = &["lng", "longitude"];
/// Candidate fields for the creation timestamp, in priority order.
pub const CREATED_AT_FIELDS: &[&str] = &["createdAt", "created_at", "creadoEn"];

/// Category label for incidents without one.
pub const DEFAULT_CATEGORY: &str = "sin_categoria";
/// Urgency label for incidents without one.
pub const DEFAULT_URGENCY: &str = "medio";
/// Status label for incidents without one.
pub const DEFAULT_STATUS: &str = "pendiente";
/// Location label for incidents without a usable location.
pub const DEFAULT_LOCATION: &str = "sin_ubicacion";

/// Naive date-time layouts accepted for creation timestamps, tried in order
/// after RFC 3339. Covers ISO 8601 extended and basic forms down to minute
/// precision.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
];

/// Offset-carrying layouts that RFC 3339 parsing rejects: offsets without
/// a colon or without minutes, minute precision, and the basic format.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y%m%dT%H%M%S%.f%#z",
    "%Y%m%dT%H%M%#z",
];

/// Date-only layouts, read as midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Hour-of-day bucket for the creation-time histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HourBucket {
    /// Parsed hour, `0..=23`.
    Hour(u32),
    /// Missing or unparseable timestamp.
    Unknown,
}

impl std::fmt::Display for HourBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hour(hour) => write!(f, "{hour:02}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// The bucket labels of one incident, one per dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedIncident {
    /// Category label.
    pub category: String,
    /// Urgency label.
    pub urgency: String,
    /// Status label.
    pub status: String,
    /// Location label.
    pub location: String,
    /// Creation-hour bucket.
    pub hour: HourBucket,
}

/// Resolves every dimension of `record`.
#[must_use]
pub fn normalize(record: &IncidentRecord) -> NormalizedIncident {
    NormalizedIncident {
        category: category(record),
        urgency: urgency(record),
        status: status(record),
        location: location(record),
        hour: creation_hour(record),
    }
}

/// Category label of `record`.
#[must_use]
pub fn category(record: &IncidentRecord) -> String {
    first_present(record, CATEGORY_FIELDS).map_or_else(|| DEFAULT_CATEGORY.to_string(), coerce)
}

/// Urgency label of `record`.
#[must_use]
pub fn urgency(record: &IncidentRecord) -> String {
    first_present(record, URGENCY_FIELDS).map_or_else(|| DEFAULT_URGENCY.to_string(), coerce)
}

/// Status label of `record`.
#[must_use]
pub fn status(record: &IncidentRecord) -> String {
    first_present(record, STATUS_FIELDS).map_or_else(|| DEFAULT_STATUS.to_string(), coerce)
}

/// Location label of `record`.
///
/// A structured location yields its name, else `"lat,lng"`, else the
/// default. Any other present value is coerced directly.
#[must_use]
pub fn location(record: &IncidentRecord) -> String {
    match record.get(LOCATION_FIELD) {
        Some(Value::Object(place)) => {
            if let Some(name) = first_present(place, &[LOCATION_NAME_FIELD]) {
                return coerce(name);
            }
            match (
                present_or_last(place, LATITUDE_FIELDS),
                present_or_last(place, LONGITUDE_FIELDS),
            ) {
                (Some(lat), Some(lng)) => format!("{},{}", coerce(lat), coerce(lng)),
                _ => DEFAULT_LOCATION.to_string(),
            }
        }
        Some(value) if is_present(value) => coerce(value),
        _ => DEFAULT_LOCATION.to_string(),
    }
}

/// Creation-hour bucket of `record`.
#[must_use]
pub fn creation_hour(record: &IncidentRecord) -> HourBucket {
    first_present(record, CREATED_AT_FIELDS)
        .and_then(|value| parse_timestamp(&coerce(value)))
        .map_or(HourBucket::Unknown, |dt| HourBucket::Hour(dt.hour()))
}

/// Parses an ISO 8601 style timestamp.
///
/// Timestamps carrying an offset keep their wall-clock time in that offset.
/// A bare date is treated as midnight.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.naive_local());
        }
    }

    // A trailing `Z` is UTC, whose wall clock is the naive time itself.
    let naive = text.strip_suffix(['Z', 'z']).unwrap_or(text);

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(naive, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// First usable value among `fields`, in order.
fn first_present<'a>(record: &'a IncidentRecord, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .filter_map(|field| record.get(*field))
        .find(|value| is_present(value))
}

/// First usable value among `fields`, else whatever non-null value the last
/// field holds, even an empty or zero one.
fn present_or_last<'a>(record: &'a IncidentRecord, fields: &[&str]) -> Option<&'a Value> {
    first_present(record, fields).or_else(|| {
        fields
            .last()
            .and_then(|field| record.get(*field))
            .filter(|value| !value.is_null())
    })
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
