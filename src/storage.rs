//! Object storage: the S3 client, bucket provisioning and listing.
//!
//! [`ObjectStore`] is bound to a single bucket. [`S3Store`] talks to AWS (or
//! any S3-compatible endpoint) through `aws-sdk-s3`.
//!
//! # Failure policy
//!
//! - Bucket creation failing is logged and ignored; most of the time the
//!   bucket already exists.
//! - The existence probe failing is fatal: nothing after it can succeed.
//! - Listing is for the operator's benefit only and never fails the run.

use crate::error::PipelineError;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::{error, info, instrument, warn};

/// Result of a create-bucket call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketCreation {
    Created,
    AlreadyExists,
}

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
}

/// Operations the pipeline needs from a bucket.
pub trait ObjectStore {
    /// Name of the bucket this store writes to.
    fn bucket(&self) -> &str;

    /// Create the bucket in `region`.
    async fn create_bucket(&self, region: &str) -> Result<BucketCreation, PipelineError>;

    /// Check that the bucket exists and we may access it.
    async fn head_bucket(&self) -> Result<(), PipelineError>;

    /// Upload a local file unmodified under `key`.
    async fn put_file(&self, key: &str, path: &Path) -> Result<(), PipelineError>;

    /// List every object in the bucket.
    async fn list_objects(&self) -> Result<Vec<ObjectSummary>, PipelineError>;
}

/// `s3://bucket/key` form used in log lines.
pub fn s3_uri(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

/// Bucket configuration pinning the bucket to `region`.
///
/// `us-east-1` is the default location and S3 refuses it as an explicit
/// constraint, so no configuration is sent for it.
pub fn location_constraint(region: &str) -> Option<CreateBucketConfiguration> {
    if region == "us-east-1" {
        return None;
    }
    Some(
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build(),
    )
}

/// [`ObjectStore`] backed by Amazon S3.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from the ambient AWS credentials chain.
    ///
    /// When `endpoint_url` is set the client uses path-style addressing, which
    /// MinIO and LocalStack expect.
    #[instrument(level = "info", skip_all, fields(%bucket, %region))]
    pub async fn connect(bucket: &str, region: &str, endpoint_url: Option<&str>) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint_url {
            info!(%endpoint, "Using custom S3 endpoint");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
        }
    }
}

impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn create_bucket(&self, region: &str) -> Result<BucketCreation, PipelineError> {
        let request = self
            .client
            .create_bucket()
            .bucket(&self.bucket)
            .set_create_bucket_configuration(location_constraint(region));

        match request.send().await {
            Ok(_) => Ok(BucketCreation::Created),
            Err(e) => {
                let service = e.as_service_error();
                if service.is_some_and(|s| {
                    s.is_bucket_already_owned_by_you() || s.is_bucket_already_exists()
                }) {
                    Ok(BucketCreation::AlreadyExists)
                } else {
                    Err(PipelineError::storage(
                        "create_bucket",
                        DisplayErrorContext(&e).to_string(),
                    ))
                }
            }
        }
    }

    async fn head_bucket(&self) -> Result<(), PipelineError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| PipelineError::BucketUnavailable {
                bucket: self.bucket.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<(), PipelineError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| PipelineError::storage("put_object", format!("{}: {e}", path.display())))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| PipelineError::storage("put_object", DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn list_objects(&self) -> Result<Vec<ObjectSummary>, PipelineError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    PipelineError::storage("list_objects_v2", DisplayErrorContext(&e).to_string())
                })?;

            for object in output.contents() {
                objects.push(ObjectSummary {
                    key: object.key().unwrap_or_default().to_string(),
                    size: object.size().unwrap_or_default(),
                });
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }
}

/// Make sure the bucket exists and is reachable.
///
/// Creation errors are logged and swallowed; an unreachable bucket is
/// returned as [`PipelineError::BucketUnavailable`].
#[instrument(level = "info", skip_all, fields(bucket = %store.bucket(), %region))]
pub async fn provision_bucket<S: ObjectStore>(store: &S, region: &str) -> Result<(), PipelineError> {
    match store.create_bucket(region).await {
        Ok(BucketCreation::Created) => {
            info!(bucket = %store.bucket(), %region, "Bucket created");
        }
        Ok(BucketCreation::AlreadyExists) => {
            info!(bucket = %store.bucket(), "Bucket already exists");
        }
        Err(e) => {
            warn!(error = %e, "Error creating bucket; probing for access anyway");
        }
    }

    if let Err(e) = store.head_bucket().await {
        error!(error = %e, "Cannot access bucket");
        return Err(e);
    }
    info!(bucket = %store.bucket(), "Bucket is accessible");
    Ok(())
}

/// Log every object in the bucket with its size.
#[instrument(level = "info", skip_all, fields(bucket = %store.bucket()))]
pub async fn log_bucket_contents<S: ObjectStore>(store: &S) {
    match store.list_objects().await {
        Ok(objects) => {
            info!(count = objects.len(), "Current bucket contents");
            for object in &objects {
                info!(key = %object.key, size = object.size, "Bucket object");
            }
        }
        Err(e) => warn!(error = %e, "Could not list bucket contents"),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory bucket with switchable failures.
    #[derive(Debug, Default)]
    pub struct MemoryStore {
        pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
        pub exists: Mutex<bool>,
        pub fail_create: bool,
        pub fail_head: bool,
        pub fail_put: bool,
        pub fail_list: bool,
        pub list_calls: Mutex<usize>,
    }

    impl MemoryStore {
        pub fn object(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(key).cloned()
        }

        pub fn list_calls(&self) -> usize {
            *self.list_calls.lock().unwrap()
        }

        pub fn keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }
    }

    impl ObjectStore for MemoryStore {
        fn bucket(&self) -> &str {
            "test-bucket"
        }

        async fn create_bucket(&self, _region: &str) -> Result<BucketCreation, PipelineError> {
            if self.fail_create {
                return Err(PipelineError::storage("create_bucket", "access denied"));
            }
            let mut exists = self.exists.lock().unwrap();
            if *exists {
                Ok(BucketCreation::AlreadyExists)
            } else {
                *exists = true;
                Ok(BucketCreation::Created)
            }
        }

        async fn head_bucket(&self) -> Result<(), PipelineError> {
            if self.fail_head {
                return Err(PipelineError::BucketUnavailable {
                    bucket: self.bucket().to_string(),
                    message: "403 Forbidden".to_string(),
                });
            }
            Ok(())
        }

        async fn put_file(&self, key: &str, path: &Path) -> Result<(), PipelineError> {
            if self.fail_put {
                return Err(PipelineError::storage("put_object", "connection reset"));
            }
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| PipelineError::io(path, e))?;
            self.objects.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }

        async fn list_objects(&self) -> Result<Vec<ObjectSummary>, PipelineError> {
            *self.list_calls.lock().unwrap() += 1;
            if self.fail_list {
                return Err(PipelineError::storage("list_objects_v2", "throttled"));
            }
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .map(|(key, bytes)| ObjectSummary {
                    key: key.clone(),
                    size: bytes.len() as i64,
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryStore;
    use super::*;

    #[test]
    fn test_s3_uri() {
        assert_eq!(
            s3_uri("michel-cc-wikidata", "datalake/raw/raw-views-2024-11-18.txt"),
            "s3://michel-cc-wikidata/datalake/raw/raw-views-2024-11-18.txt"
        );
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let store = MemoryStore::default();
        provision_bucket(&store, "eu-west-1").await.unwrap();
        assert_eq!(
            store.create_bucket("eu-west-1").await.unwrap(),
            BucketCreation::AlreadyExists
        );
        provision_bucket(&store, "eu-west-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_provision_swallows_create_failure() {
        let store = MemoryStore {
            fail_create: true,
            ..Default::default()
        };
        assert!(provision_bucket(&store, "eu-west-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_provision_fails_when_probe_fails() {
        let store = MemoryStore {
            fail_head: true,
            ..Default::default()
        };
        let err = provision_bucket(&store, "eu-west-1").await.unwrap_err();
        assert!(matches!(err, PipelineError::BucketUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_log_bucket_contents_tolerates_list_failure() {
        let store = MemoryStore {
            fail_list: true,
            ..Default::default()
        };
        log_bucket_contents(&store).await;
        assert_eq!(store.list_calls(), 1);
    }

    #[test]
    fn test_location_constraint_for_regional_bucket() {
        let configuration = location_constraint("eu-west-1").unwrap();
        assert_eq!(
            configuration.location_constraint().map(|c| c.as_str()),
            Some("eu-west-1")
        );
    }

    #[test]
    fn test_no_location_constraint_for_us_east_1() {
        assert!(location_constraint("us-east-1").is_none());
    }
}
