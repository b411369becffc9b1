//! In-process store implementations.
//!
//! Both stores keep their state behind a [`Mutex`] and count calls so tests
//! can assert on pagination behaviour.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use incident_etl_models::IncidentRecord;

use crate::{ObjectListing, ObjectStore, RecordStore, ScanPage, StoreError};

/// Default number of records returned per scan page.
const DEFAULT_PAGE_SIZE: usize = 100;

/// An object held by [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object body.
    pub body: Vec<u8>,
    /// Content type supplied at write time.
    pub content_type: Option<String>,
}

/// An [`ObjectStore`] backed by an ordered in-memory map.
///
/// Listings are returned in lexicographic key order, like S3.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    puts: AtomicUsize,
    lists: AtomicUsize,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without counting it as a write.
    pub fn insert(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: None,
            },
        );
    }

    /// Returns a copy of the object at `bucket`/`key`.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// All keys in `bucket`, in listing order.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of [`ObjectStore::put_object`] calls served.
    #[must_use]
    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::Relaxed)
    }

    /// Number of [`ObjectStore::list_objects`] calls served.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<(String, String), StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing, StoreError> {
        self.lists.fetch_add(1, Ordering::Relaxed);

        let objects = self.lock();
        let mut matching = objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k)
            .filter(|k| continuation_token.is_none_or(|token| k.as_str() > token));

        let keys: Vec<String> = matching.by_ref().take(max_keys).cloned().collect();
        let next_continuation_token = if matching.next().is_some() {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ObjectListing {
            keys,
            next_continuation_token,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.object(bucket, key)
            .map(|o| o.body)
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        Ok(self.object(bucket, key).is_some())
    }
}

/// A [`RecordStore`] serving fixed tables in pages of a configurable size.
///
/// The cursor is the offset of the next record.
#[derive(Debug)]
pub struct MemoryRecordStore {
    tables: BTreeMap<String, Vec<IncidentRecord>>,
    page_size: usize,
    scans: AtomicUsize,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    /// Creates a store with no tables and the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            scans: AtomicUsize::new(0),
        }
    }

    /// Sets the number of records returned per page (minimum 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Adds (or replaces) a table.
    #[must_use]
    pub fn with_table(mut self, table: &str, records: Vec<IncidentRecord>) -> Self {
        self.tables.insert(table.to_string(), records);
        self
    }

    /// Number of [`RecordStore::scan_page`] calls served.
    #[must_use]
    pub fn scan_calls(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    type Cursor = usize;

    async fn scan_page(
        &self,
        table: &str,
        cursor: Option<usize>,
    ) -> Result<ScanPage<usize>, StoreError> {
        self.scans.fetch_add(1, Ordering::Relaxed);

        let records = self.tables.get(table).ok_or_else(|| StoreError::Scan {
            table: table.to_string(),
            source: format!("table {table} does not exist").into(),
        })?;

        let start = cursor.unwrap_or(0).min(records.len());
        let end = (start + self.page_size).min(records.len());
        let next_cursor = (end < records.len()).then_some(end);

        Ok(ScanPage {
            items: records[start..end].to_vec(),
            next_cursor,
        })
    }
}
