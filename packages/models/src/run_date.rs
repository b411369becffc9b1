//! The 8-digit run date token supplied by the scheduler.

use chrono::{Datelike as _, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Token format used in object keys (`YYYYMMDD`).
const TOKEN_FORMAT: &str = "%Y%m%d";

/// A validated calendar date identifying one ETL run.
///
/// Displays (and serializes) as the compact `YYYYMMDD` token used in every
/// object key of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunDate(NaiveDate);

impl RunDate {
    /// Parses a `YYYYMMDD` token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRunDate`] if the token is not exactly
    /// eight ASCII digits or does not name a real calendar date.
    pub fn parse(token: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidRunDate {
            value: token.to_string(),
        };

        if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        NaiveDate::parse_from_str(token, TOKEN_FORMAT)
            .map(Self)
            .map_err(|_| invalid())
    }

    /// Parses an optional token, treating absence as a configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRunDate`] if `token` is `None` or blank,
    /// otherwise whatever [`Self::parse`] returns.
    pub fn require(token: Option<&str>) -> Result<Self, ConfigError> {
        match token.map(str::trim) {
            Some(t) if !t.is_empty() => Self::parse(t),
            _ => Err(ConfigError::MissingRunDate),
        }
    }

    /// Today's date in UTC.
    #[must_use]
    pub fn today() -> Self {
        Self(Utc::now().date_naive())
    }

    /// The compact `YYYYMMDD` token.
    #[must_use]
    pub fn token(&self) -> String {
        self.0.format(TOKEN_FORMAT).to_string()
    }

    /// Four-digit year.
    #[must_use]
    pub fn year(&self) -> String {
        format!("{:04}", self.0.year())
    }

    /// Zero-padded month (`01`-`12`).
    #[must_use]
    pub fn month(&self) -> String {
        format!("{:02}", self.0.month())
    }

    /// Zero-padded day of month (`01`-`31`).
    #[must_use]
    pub fn day(&self) -> String {
        format!("{:02}", self.0.day())
    }
}

impl std::fmt::Display for RunDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(TOKEN_FORMAT))
    }
}

impl std::str::FromStr for RunDate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RunDate {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RunDate> for String {
    fn from(value: RunDate) -> Self {
        value.token()
    }
}
