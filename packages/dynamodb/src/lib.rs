#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Amazon `DynamoDB` implementation of [`RecordStore`].
//!
//! Records are fetched with `Scan`, resuming each page from the previous
//! page's `LastEvaluatedKey`. Attribute values are converted to plain JSON
//! so the snapshot never contains SDK-specific shapes:
//!
//! | `DynamoDB` | JSON |
//! |---|---|
//! | `S` | string |
//! | `N` | string (decimal text kept verbatim) |
//! | `BOOL` | bool |
//! | `NULL` | null |
//! | `M` | object |
//! | `L` | array |
//! | `SS` / `NS` | array of strings |
//! | `B` | lowercase hex string |
//! | `BS` | array of hex strings |

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use incident_etl_models::IncidentRecord;
use incident_etl_store::{RecordStore, ScanPage, StoreError};
use serde_json::Value;

/// `DynamoDB` `LastEvaluatedKey` / `ExclusiveStartKey` map.
pub type StartKey = HashMap<String, AttributeValue>;

/// [`RecordStore`] backed by an `aws-sdk-dynamodb` client.
#[derive(Debug, Clone)]
pub struct DynamoRecordStore {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoRecordStore {
    /// Creates a store from the ambient AWS configuration.
    ///
    /// `region` overrides the region resolved by the provider chain.
    pub async fn from_env(region: Option<String>) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region));
        }

        let config = config_loader.load().await;

        Self {
            client: aws_sdk_dynamodb::Client::new(&config),
        }
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: aws_sdk_dynamodb::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    type Cursor = StartKey;

    async fn scan_page(
        &self,
        table: &str,
        cursor: Option<StartKey>,
    ) -> Result<ScanPage<StartKey>, StoreError> {
        let output = self
            .client
            .scan()
            .table_name(table)
            .set_exclusive_start_key(cursor)
            .send()
            .await
            .map_err(|e| StoreError::Scan {
                table: table.to_string(),
                source: Box::new(e),
            })?;

        let items = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(item_to_record)
            .collect();

        Ok(ScanPage {
            items,
            next_cursor: output.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }
}

/// Converts one `DynamoDB` item into a JSON object.
#[must_use]
pub fn item_to_record(item: HashMap<String, AttributeValue>) -> IncidentRecord {
    item.into_iter()
        .map(|(name, value)| (name, attribute_to_json(value)))
        .collect()
}

/// Converts a single attribute value into JSON.
#[must_use]
pub fn attribute_to_json(value: AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) | AttributeValue::N(s) => Value::String(s),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::M(map) => Value::Object(item_to_record(map)),
        AttributeValue::L(list) => Value::Array(list.into_iter().map(attribute_to_json).collect()),
        AttributeValue::Ss(set) | AttributeValue::Ns(set) => {
            Value::Array(set.into_iter().map(Value::String).collect())
        }
        AttributeValue::B(blob) => Value::String(hex::encode(blob.as_ref())),
        AttributeValue::Bs(blobs) => Value::Array(
            blobs
                .iter()
                .map(|blob| Value::String(hex::encode(blob.as_ref())))
                .collect(),
        ),
        other => {
            log::warn!("Unsupported DynamoDB attribute type {other:?}, storing null");
            Value::Null
        }
    }
}
