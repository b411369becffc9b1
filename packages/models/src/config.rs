//! Explicit job configuration.
//!
//! The two storage identifiers the job needs are carried in an
//! [`EtlConfig`] value that each stage validates at its entry point, before
//! any I/O happens.
//!
//! # Environment Variables
//!
//! | Variable | Required by | Description |
//! |---|---|---|
//! | `INCIDENTS_TABLE` | extract | Name of the incident record table |
//! | `ANALYTICS_BUCKET_NAME` | all stages | Bucket holding snapshots and reports |

use thiserror::Error;

/// Environment variable naming the incident record table.
pub const TABLE_ENV: &str = "INCIDENTS_TABLE";

/// Environment variable naming the analytics bucket.
pub const BUCKET_ENV: &str = "ANALYTICS_BUCKET_NAME";

/// Errors raised while validating job configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required identifier was not supplied.
    #[error("Missing configuration value: {name} (set {env})")]
    MissingValue {
        /// Logical name of the missing value.
        name: &'static str,
        /// Environment variable that supplies it.
        env: &'static str,
    },

    /// No run date was supplied.
    #[error("Missing run date: expected a YYYYMMDD token")]
    MissingRunDate,

    /// The run date token was malformed.
    #[error("Invalid run date '{value}': expected YYYYMMDD")]
    InvalidRunDate {
        /// The rejected token.
        value: String,
    },
}

/// Storage identifiers for one ETL run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EtlConfig {
    /// Incident record table name.
    pub table_name: Option<String>,
    /// Analytics bucket name.
    pub bucket: Option<String>,
}

impl EtlConfig {
    /// Creates a config from explicit identifiers.
    #[must_use]
    pub fn new(table_name: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            table_name: Some(table_name.into()),
            bucket: Some(bucket.into()),
        }
    }

    /// Reads [`TABLE_ENV`] and [`BUCKET_ENV`] from the environment.
    ///
    /// Unset variables are left as `None`; validation happens later in
    /// [`Self::require_table`] / [`Self::require_bucket`].
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            table_name: std::env::var(TABLE_ENV).ok(),
            bucket: std::env::var(BUCKET_ENV).ok(),
        }
    }

    /// Replaces any value for which `Some` is given.
    #[must_use]
    pub fn with_overrides(mut self, table_name: Option<String>, bucket: Option<String>) -> Self {
        if table_name.is_some() {
            self.table_name = table_name;
        }
        if bucket.is_some() {
            self.bucket = bucket;
        }
        self
    }

    /// Returns the table name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingValue`] if the table name is unset or
    /// blank.
    pub fn require_table(&self) -> Result<&str, ConfigError> {
        non_blank(self.table_name.as_deref()).ok_or(ConfigError::MissingValue {
            name: "incident table",
            env: TABLE_ENV,
        })
    }

    /// Returns the bucket name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingValue`] if the bucket is unset or blank.
    pub fn require_bucket(&self) -> Result<&str, ConfigError> {
        non_blank(self.bucket.as_deref()).ok_or(ConfigError::MissingValue {
            name: "analytics bucket",
            env: BUCKET_ENV,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
