#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Amazon S3 implementation of [`ObjectStore`].
//!
//! Authentication, region and endpoint come from the standard AWS provider
//! chain (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`,
//! `AWS_ENDPOINT_URL`, instance roles, `~/.aws/config`, ...). Transient
//! failures are not retried here; they surface as [`StoreError`]s for the
//! scheduler to retry the run.

use async_trait::async_trait;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use incident_etl_store::{ObjectListing, ObjectStore, StoreError};

/// [`ObjectStore`] backed by an `aws-sdk-s3` client.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
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
            client: aws_sdk_s3::Client::new(&config),
        }
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let size = body.len();
        log::debug!("PutObject s3://{bucket}/{key} ({size} bytes)");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(content_type.map(str::to_string))
            .send()
            .await
            .map_err(|e| StoreError::Put {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: usize,
        continuation_token: Option<&str>,
    ) -> Result<ObjectListing, StoreError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX))
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| StoreError::List {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                source: Box::new(e),
            })?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();

        let next_continuation_token = if output.is_truncated() == Some(true) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectListing {
            keys,
            next_continuation_token,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::get_object::GetObjectError::is_no_such_key)
                {
                    StoreError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StoreError::Get {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        source: Box::new(err),
                    }
                }
            })?;

        let bytes = output.body.collect().await.map_err(|e| StoreError::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: Box::new(e),
        })?;

        Ok(bytes.into_bytes().to_vec())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                // NotFound only means the object doesn't exist
                if err
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found)
                {
                    return Ok(false);
                }
                Err(StoreError::Head {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }
}
