//! S3 blob source implementation
//!
//! Provides [`S3Source`], the object-storage driver for the Strata blob
//! store. Metadata operations issue `HeadObject`; content reads are lazy
//! `GetObject` calls with optional validator-conditional fetching; walks
//! reconstruct the path hierarchy from flat keys via paginated
//! `ListObjectsV2`.
//!
//! Read operations degrade to absent on any failure (including
//! not-found); mutating operations surface typed errors so writes never
//! silently vanish. Read-side local materialization goes through the
//! shared [`BlobCache`], keyed by the object's ETag; writable local paths
//! are unsupported by design (object storage cannot expose one).
//!
//! ## Timeout Configuration
//!
//! The `timeout_ms` setting controls the total operation timeout, which
//! includes SDK retry time.

use crate::error::{Result, S3SourceError};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_smithy_types::retry::RetryConfig;
use aws_smithy_types::timeout::TimeoutConfig;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strata_blob::{ContentFilter, SourceConfig, SourceFactory};
use strata_core::error::Error as CoreError;
use strata_core::{
    prefix_claims, strip_prefix, walk_flat_keys, AttributeMatcher, Blob, BlobBody, BlobCache,
    BlobRead, BlobSource, BlobWrite, LocalMaterialize, WalkFilter, UNKNOWN,
};
use tracing::debug;

/// S3 driver configuration
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// Root key prefix inside the bucket (all objects live under it)
    pub root: Option<String>,
    /// Optional endpoint override (e.g. LocalStack/MinIO)
    pub endpoint: Option<String>,
    /// Operation timeout in milliseconds (optional)
    pub timeout_ms: Option<u64>,
    /// Max retries *after* the initial attempt
    pub max_retries: Option<u32>,
    /// Initial backoff for retries in milliseconds
    pub retry_base_delay_ms: Option<u64>,
    /// Max backoff for retries in milliseconds
    pub retry_max_delay_ms: Option<u64>,
}

/// S3-backed blob source
#[derive(Clone)]
pub struct S3Source {
    client: Client,
    bucket: String,
    root: Option<String>,
    label: String,
    prefix: Option<String>,
    content_filter: ContentFilter,
    cache: Arc<BlobCache>,
}

impl Debug for S3Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Source")
            .field("label", &self.label)
            .field("bucket", &self.bucket)
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl S3Source {
    /// Create a new S3 source.
    ///
    /// # Arguments
    ///
    /// * `sdk_config` - AWS SDK configuration (from `aws_config::load_defaults()`)
    /// * `config` - driver configuration (bucket, root, timeout/retry)
    /// * `source` - the store-level source configuration (label, prefix scoping)
    /// * `cache` - materialization cache for read-side local paths
    pub async fn new(
        sdk_config: &aws_config::SdkConfig,
        config: S3Config,
        source: &SourceConfig,
        cache: Arc<BlobCache>,
    ) -> Result<Self> {
        if sdk_config.region().is_none() {
            return Err(S3SourceError::MissingRegion);
        }
        if config.bucket.is_empty() {
            return Err(S3SourceError::invalid_config("bucket must not be empty"));
        }

        // Inherit from SdkConfig (HTTP client, credentials, endpoints),
        // then apply our overrides.
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if config.max_retries.is_some()
            || config.retry_base_delay_ms.is_some()
            || config.retry_max_delay_ms.is_some()
        {
            // AWS SDK uses "max attempts" = initial attempt + retries
            let max_attempts = config.max_retries.unwrap_or(0).saturating_add(1).max(1);
            let mut retry_config = RetryConfig::standard().with_max_attempts(max_attempts);
            if let Some(ms) = config.retry_base_delay_ms {
                retry_config = retry_config.with_initial_backoff(Duration::from_millis(ms));
            }
            if let Some(ms) = config.retry_max_delay_ms {
                retry_config = retry_config.with_max_backoff(Duration::from_millis(ms));
            }
            builder = builder.retry_config(retry_config);
        }

        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        let client = Client::from_conf(builder.build());

        Ok(Self {
            client,
            bucket: config.bucket,
            root: config.root,
            label: source.label.clone(),
            prefix: source.prefix.clone(),
            content_filter: source.content_filter.clone(),
            cache,
        })
    }

    /// Create from a pre-built client (for testing).
    pub fn from_client(
        client: Client,
        bucket: String,
        root: Option<String>,
        source: &SourceConfig,
        cache: Arc<BlobCache>,
    ) -> Self {
        Self {
            client,
            bucket,
            root,
            label: source.label.clone(),
            prefix: source.prefix.clone(),
            content_filter: source.content_filter.clone(),
            cache,
        }
    }

    /// The bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Map a store path to an S3 key.
    ///
    /// The configured scoping prefix is relativized away, then the
    /// remainder is appended to the bucket root.
    fn to_key(&self, path: &str) -> String {
        let relative = strip_prefix(self.prefix.as_deref(), path);
        match &self.root {
            Some(root) => {
                let root = root.trim_matches('/');
                if relative.is_empty() {
                    root.to_string()
                } else {
                    format!("{}/{}", root, relative)
                }
            }
            None => relative.to_string(),
        }
    }

    /// Map an S3 key back to a store path (inverse of [`to_key`]).
    ///
    /// [`to_key`]: S3Source::to_key
    fn from_key(&self, key: &str) -> String {
        let relative = match &self.root {
            Some(root) => {
                let root = root.trim_matches('/');
                key.strip_prefix(root)
                    .map(|rest| rest.trim_start_matches('/'))
                    .unwrap_or(key)
            }
            None => key,
        };
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), relative),
            None => relative.to_string(),
        }
    }

    async fn head(
        &self,
        path: &str,
    ) -> Option<aws_sdk_s3::operation::head_object::HeadObjectOutput> {
        if !self.can_handle(path) {
            return None;
        }
        let key = self.to_key(path);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => Some(output),
            Err(e) => {
                // Reads degrade to absent on any failure, including 404.
                debug!(label = %self.label, key, "head failed: {:?}", e);
                None
            }
        }
    }

    /// Fetch content, short-circuiting when the validator still matches.
    ///
    /// Returns `Ok(None)` when the remote object is unchanged (HTTP 304).
    pub async fn content_conditional(
        &self,
        path: &str,
        validator: Option<&str>,
    ) -> Result<Option<Vec<u8>>> {
        let key = self.to_key(path);
        let mut request = self.client.get_object().bucket(&self.bucket).key(&key);
        if let Some(etag) = validator {
            request = request.if_none_match(quote_etag(etag));
        }

        match request.send().await {
            Ok(response) => {
                let bytes = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| S3SourceError::io(format!("Failed to read S3 body: {}", e)))?
                    .into_bytes()
                    .to_vec();
                Ok(Some(bytes))
            }
            Err(e) if sdk_status(&e) == Some(304) => Ok(None),
            Err(e) => Err(map_sdk_error(e, &key)),
        }
    }
}

/// AWS expects ETags to be quoted.
fn quote_etag(etag: &str) -> String {
    if etag.starts_with('"') {
        etag.to_string()
    } else {
        format!("\"{}\"", etag)
    }
}

/// Strip surrounding quotes from an ETag.
fn normalize_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// HTTP status of a service error, if the SDK reached the service.
fn sdk_status<E: Debug>(err: &aws_sdk_s3::error::SdkError<E>) -> Option<u16> {
    use aws_sdk_s3::error::SdkError;
    match err {
        SdkError::ServiceError(service_err) => Some(service_err.raw().status().as_u16()),
        _ => None,
    }
}

/// Map an SDK error to a driver error, classifying by HTTP status.
fn map_sdk_error<E: Debug>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> S3SourceError {
    use aws_sdk_s3::error::SdkError;

    match &err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            match status {
                404 => S3SourceError::not_found(format!("Key not found: {}", key)),
                403 => S3SourceError::forbidden(format!("Access denied for key: {}", key)),
                _ => S3SourceError::s3(format!(
                    "S3 error for key '{}' (HTTP {}): {:?}",
                    key, status, err
                )),
            }
        }
        SdkError::TimeoutError(_) => {
            S3SourceError::io(format!("S3 timeout for key '{}': {:?}", key, err))
        }
        SdkError::DispatchFailure(_) => {
            S3SourceError::io(format!("S3 connection error for key '{}': {:?}", key, err))
        }
        _ => S3SourceError::s3(format!("S3 error for key '{}': {:?}", key, err)),
    }
}

fn datetime_millis(dt: Option<&aws_smithy_types::DateTime>) -> i64 {
    dt.map(|d| d.to_millis().unwrap_or(UNKNOWN)).unwrap_or(UNKNOWN)
}

#[async_trait]
impl BlobRead for S3Source {
    fn label(&self) -> &str {
        &self.label
    }

    fn can_handle(&self, path: &str) -> bool {
        prefix_claims(self.prefix.as_deref(), path) && self.content_filter.accepts(path)
    }

    async fn has(&self, path: &str) -> bool {
        self.head(path).await.is_some()
    }

    async fn get(&self, path: &str) -> Option<Blob> {
        let head = self.head(path).await?;

        let mut blob = Blob::metadata(path)
            .with_size(head.content_length().unwrap_or(UNKNOWN))
            .with_last_modified(datetime_millis(head.last_modified()));
        if let Some(etag) = head.e_tag() {
            blob = blob.with_etag(normalize_etag(etag));
        }
        if let Some(content_type) = head.content_type() {
            blob = blob.with_content_type(content_type);
        }

        // Content stays remote until the caller realizes it.
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = self.to_key(path);
        let thunk = move || -> futures::future::BoxFuture<'static, strata_core::Result<Vec<u8>>> {
            Box::pin(async move {
                let response = client
                    .get_object()
                    .bucket(&bucket)
                    .key(&key)
                    .send()
                    .await
                    .map_err(|e| CoreError::from(map_sdk_error(e, &key)))?;
                let bytes = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| CoreError::io(format!("Failed to read S3 body: {}", e)))?
                    .into_bytes()
                    .to_vec();
                Ok(bytes)
            })
        };
        Some(blob.with_body(BlobBody::Deferred(Box::new(thunk))))
    }

    async fn content(&self, path: &str) -> Option<Vec<u8>> {
        if !self.can_handle(path) {
            return None;
        }
        match self.content_conditional(path, None).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(label = %self.label, path, "content read failed: {}", e);
                None
            }
        }
    }

    async fn size(&self, path: &str) -> i64 {
        self.head(path)
            .await
            .and_then(|h| h.content_length())
            .unwrap_or(UNKNOWN)
    }

    async fn last_modified(&self, path: &str) -> i64 {
        self.head(path)
            .await
            .map(|h| datetime_millis(h.last_modified()))
            .unwrap_or(UNKNOWN)
    }

    async fn walk(
        &self,
        path: &str,
        max_depth: usize,
        filter: &WalkFilter,
        matcher: AttributeMatcher<'_>,
    ) -> Vec<String> {
        let walk_root = path.trim_matches('/');
        let key_prefix = {
            let base = self.to_key(walk_root);
            if base.is_empty() {
                base
            } else {
                format!("{}/", base)
            }
        };

        // Object storage has no native directories: list every key under
        // the prefix and reconstruct the hierarchy level by level.
        let mut relative_keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&key_prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!(label = %self.label, key_prefix, "list failed: {:?}", e);
                    return Vec::new();
                }
            };

            for object in response.contents() {
                if let Some(key) = object.key() {
                    let store_path = self.from_key(key);
                    if !self.can_handle(&store_path) {
                        continue;
                    }
                    let relative = if walk_root.is_empty() {
                        Some(store_path.as_str())
                    } else {
                        store_path
                            .strip_prefix(walk_root)
                            .and_then(|rest| rest.strip_prefix('/'))
                    };
                    if let Some(relative) = relative {
                        relative_keys.push(relative.to_string());
                    }
                }
            }

            match response.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }

        relative_keys.sort();
        walk_flat_keys(relative_keys, max_depth, filter, matcher)
    }
}

#[async_trait]
impl BlobWrite for S3Source {
    async fn put(&self, path: &str, bytes: &[u8]) -> strata_core::Result<()> {
        let key = self.to_key(path);

        // The S3 write API requires a known length; the payload is
        // buffered in full before upload.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| CoreError::from(map_sdk_error(e, &key)))?;

        Ok(())
    }

    async fn delete(&self, path: &str) -> strata_core::Result<()> {
        let key = self.to_key(path);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| CoreError::from(map_sdk_error(e, &key)))?;

        Ok(())
    }
}

#[async_trait]
impl LocalMaterialize for S3Source {
    async fn read_local_path(&self, path: &str) -> strata_core::Result<PathBuf> {
        let head = self.head(path).await.ok_or_else(|| {
            CoreError::not_found(format!("no S3 object at '{}' to materialize", path))
        })?;
        let validator = head.e_tag().map(normalize_etag).unwrap_or_default();

        if let Some(local) = self.cache.get(path, &validator).await {
            debug!(label = %self.label, path, "materialization cache hit");
            return Ok(local);
        }

        let bytes = self
            .content_conditional(path, None)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::not_found(format!("S3 object vanished: {}", path)))?;
        self.cache.put(path, &validator, &bytes).await
    }

    async fn write_local_path(&self, path: &str) -> strata_core::Result<PathBuf> {
        Err(S3SourceError::unsupported(format!(
            "object storage cannot expose a writable local file for '{}'",
            path
        ))
        .into())
    }
}

impl BlobSource for S3Source {
    fn writer(&self) -> Option<&dyn BlobWrite> {
        Some(self)
    }

    fn local(&self) -> Option<&dyn LocalMaterialize> {
        Some(self)
    }
}

/// Factory for S3 sources sharing one SDK config, bucket, and cache.
pub struct S3SourceFactory {
    sdk_config: aws_config::SdkConfig,
    config: S3Config,
    cache: Arc<BlobCache>,
}

impl S3SourceFactory {
    /// Factory whose sources share `sdk_config`, `config`, and `cache`.
    pub fn new(
        sdk_config: aws_config::SdkConfig,
        config: S3Config,
        cache: Arc<BlobCache>,
    ) -> Self {
        Self {
            sdk_config,
            config,
            cache,
        }
    }
}

impl Debug for S3SourceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3SourceFactory")
            .field("bucket", &self.config.bucket)
            .field("root", &self.config.root)
            .finish()
    }
}

#[async_trait]
impl SourceFactory for S3SourceFactory {
    async fn create(&self, source: &SourceConfig) -> strata_core::Result<Arc<dyn BlobSource>> {
        let driver = S3Source::new(
            &self.sdk_config,
            self.config.clone(),
            source,
            self.cache.clone(),
        )
        .await
        .map_err(CoreError::from)?;
        Ok(Arc::new(driver))
    }
}
