#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Narrow storage interfaces consumed by the ETL stages.
//!
//! The job only ever needs two collaborators:
//!
//! * a [`RecordStore`] that can scan every incident record page by page,
//! * an [`ObjectStore`] that can write, list and read objects and check that one exists.
//!
//! Concrete adapters live in their own crates (`incident_etl_dynamodb`,
//! `incident_etl_s3`). The [`memory`] module provides in-process versions
//! used by tests and dry runs.

pub mod memory;

use async_trait::async_trait;
use incident_etl_models::IncidentRecord;

/// Boxed error returned by an underlying SDK or backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while talking to a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Scanning the record table failed.
    #[error("Failed to scan table {table}: {source}")]
    Scan {
        /// Table name.
        table: String,
        /// Underlying backend error.
        source: BoxError,
    },

    /// Writing an object failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Put {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying backend error.
        source: BoxError,
    },

    /// Listing objects failed.
    #[error("Failed to list s3://{bucket}/{prefix}: {source}")]
    List {
        /// Bucket name.
        bucket: String,
        /// Key prefix.
        prefix: String,
        /// Underlying backend error.
        source: BoxError,
    },

    /// Reading an object failed.
    #[error("Failed to download s3://{bucket}/{key}: {source}")]
    Get {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying backend error.
        source: BoxError,
    },

    /// Probing an object's existence failed.
    #[error("Failed to head s3://{bucket}/{key}: {source}")]
    Head {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying backend error.
        source: BoxError,
    },

    /// The requested object does not exist.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
}

/// One page of a table scan.
#[derive(Debug, Clone)]
pub struct ScanPage<C> {
    /// Records on this page.
    pub items: Vec<IncidentRecord>,
    /// Cursor to resume from, or `None` when the scan is exhausted.
    pub next_cursor: Option<C>,
}

/// A key-value store holding incident records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Opaque continuation cursor handed back by [`Self::scan_page`].
    type Cursor: Send + Sync;

    /// Returns the page of `table` that starts at `cursor` (or the first
    /// page when `cursor` is `None`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Scan`] if the backend rejects the request.
    async fn scan_page(
        &self,
        table: &str,
        cursor: Option<Self::Cursor>,
    ) -> Result<ScanPage<Self::Cursor>, StoreError>;
}

/// One page of an object listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    /// Full object keys, in the store's listing order.
    pub keys: Vec<String>,
    /// Token for the next page, or `None` when the listing is complete.
    pub next_continuation_token: Option<String>,
}

/// An object store holding snapshots and reports.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `body` to `bucket`/`key`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Put`] on backend failures.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Lists at most `max_keys` keys under `prefix`, resuming from
    /// `continuation_token` when given.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::List`] on backend failures.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing, StoreError>;

    /// Reads the full body of `bucket`/`key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the object does not exist and
    /// [`StoreError::Get`] on other backend failures.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Whether `bucket`/`key` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Head`] on backend failures other than
    /// not-found.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StoreError>;
}

/// Lists every key under `prefix`, following continuation tokens until the
/// listing is exhausted.
///
/// # Errors
///
/// Returns [`StoreError::List`] if any page request fails.
pub async fn list_all_keys(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    page_size: usize,
) -> Result<Vec<String>, StoreError> {
    log::info!("Listing s3://{bucket}/{prefix}*");

    let mut keys = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let page = store
            .list_objects(bucket, prefix, page_size, continuation_token.as_deref())
            .await?;
        keys.extend(page.keys);

        match page.next_continuation_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }

    log::info!("  found {} objects", keys.len());
    Ok(keys)
}
