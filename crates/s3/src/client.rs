//! S3 backend implementation
//!
//! Wraps aws-sdk-s3 and implements the [`Backend`] trait from bk-core.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_smithy_types::error::display::DisplayErrorContext;
use tokio::io::AsyncWriteExt;

use bk_core::backend::BackendResult;
use bk_core::{
    Backend, BackendError, ConnectionProfile, DeleteOutcome, HeadInfo, ListPage, ListPageRequest,
    ObjectInfo, Result, Store, StoreConfig,
};

/// Region used for custom endpoints when none is configured
const FALLBACK_REGION: &str = "us-east-1";

/// S3 backend wrapper
#[derive(Debug, Clone)]
pub struct S3Backend {
    inner: aws_sdk_s3::Client,
}

impl S3Backend {
    /// Create a new client from a connection profile
    pub async fn connect(profile: &ConnectionProfile) -> Result<Self> {
        profile.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(name) = &profile.profile {
            loader = loader.profile_name(name);
        }

        match (&profile.region, &profile.endpoint) {
            (Some(region), _) => loader = loader.region(aws_config::Region::new(region.clone())),
            (None, Some(_)) => loader = loader.region(aws_config::Region::new(FALLBACK_REGION)),
            (None, None) => {}
        }

        if let Some(endpoint) = &profile.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        if let Some((access_key, secret_key)) = profile.static_credentials() {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "bk-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        let config = loader
            .retry_config(
                aws_config::retry::RetryConfig::standard()
                    .with_max_attempts(profile.retry.max_attempts),
            )
            .timeout_config(
                aws_config::timeout::TimeoutConfig::builder()
                    .connect_timeout(Duration::from_millis(profile.timeout.connect_ms))
                    .read_timeout(Duration::from_millis(profile.timeout.read_ms))
                    .build(),
            )
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(profile.path_style)
            .build();

        tracing::debug!(
            endpoint = ?profile.endpoint,
            region = ?config.region(),
            path_style = profile.path_style,
            "Created S3 client"
        );

        Ok(Self::from_client(aws_sdk_s3::Client::from_conf(s3_config)))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(inner: aws_sdk_s3::Client) -> Self {
        Self { inner }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Builds [`S3Backend`] clients on demand for a [`Store`]
#[derive(Debug, Clone, Default)]
pub struct S3Connector {
    profile: ConnectionProfile,
}

impl S3Connector {
    pub fn new(profile: ConnectionProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Connect now
    pub async fn connect(&self) -> Result<S3Backend> {
        S3Backend::connect(&self.profile).await
    }

    /// A store that connects with this profile on first use
    pub fn into_store(self, config: StoreConfig) -> Store<S3Backend> {
        Store::new(config, move || {
            let profile = self.profile.clone();
            async move { S3Backend::connect(&profile).await }
        })
    }
}

/// Extract the service code and message of an SDK failure
///
/// Body-less responses (a `HEAD` 404) carry no code; the HTTP status is used
/// instead.
fn backend_error<E>(err: SdkError<E, HttpResponse>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err
        .code()
        .map(str::to_string)
        .or_else(|| status.map(|s| s.to_string()))
        .unwrap_or_else(|| "Unknown".to_string());
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    BackendError::new(code, message)
}

fn timestamp(value: Option<&aws_sdk_s3::primitives::DateTime>) -> Option<jiff::Timestamp> {
    value.and_then(|t| jiff::Timestamp::from_second(t.secs()).ok())
}

fn trim_etag(etag: Option<&str>) -> Option<String> {
    etag.map(|e| e.trim_matches('"').to_string())
        .filter(|e| !e.is_empty())
}

fn object_info(object: &aws_sdk_s3::types::Object) -> ObjectInfo {
    let size = object.size().unwrap_or(0).max(0) as u64;
    let mut info = ObjectInfo::file(object.key().unwrap_or_default(), size);
    info.last_modified = timestamp(object.last_modified());
    info.etag = trim_etag(object.e_tag());
    info.storage_class = object.storage_class().map(|sc| sc.as_str().to_string());
    info
}

fn local_io(path: &Path, err: std::io::Error) -> BackendError {
    BackendError::new("LocalIo", format!("{}: {err}", path.display()))
}

/// Sibling path a download streams into before it is moved into place
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

async fn write_body(mut body: ByteStream, part: &Path) -> BackendResult<()> {
    let mut file = tokio::fs::File::create(part)
        .await
        .map_err(|e| local_io(part, e))?;
    while let Some(chunk) = body
        .try_next()
        .await
        .map_err(|e| BackendError::new("StreamError", e.to_string()))?
    {
        file.write_all(&chunk).await.map_err(|e| local_io(part, e))?;
    }
    file.flush().await.map_err(|e| local_io(part, e))?;
    Ok(())
}

/// Move a complete download to `path`, or discard the partial file
async fn commit(part: &Path, path: &Path, written: BackendResult<()>) -> BackendResult<()> {
    match written {
        Ok(()) => tokio::fs::rename(part, path)
            .await
            .map_err(|e| local_io(path, e)),
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(part).await {
                tracing::warn!(path = %part.display(), "Failed to remove partial download: {cleanup}");
            }
            Err(e)
        }
    }
}

#[async_trait]
impl Backend for S3Backend {
    async fn head(&self, bucket: &str, key: &str) -> BackendResult<HeadInfo> {
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(HeadInfo {
            size: response.content_length().unwrap_or(0).max(0) as u64,
            content_type: response.content_type().map(str::to_string),
            etag: trim_etag(response.e_tag()),
            last_modified: timestamp(response.last_modified()),
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> BackendResult<Vec<u8>> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| BackendError::new("StreamError", e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()> {
        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn delete_one(&self, bucket: &str, key: &str) -> BackendResult<()> {
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn delete_many(&self, bucket: &str, keys: Vec<String>) -> BackendResult<DeleteOutcome> {
        if keys.is_empty() {
            return Ok(DeleteOutcome::default());
        }

        let objects = keys
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k).build())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BackendError::new("InvalidRequest", e.to_string()))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| BackendError::new("InvalidRequest", e.to_string()))?;

        let response = self
            .inner
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(backend_error)?;

        let failed: Vec<(String, BackendError)> = response
            .errors()
            .iter()
            .map(|e| {
                (
                    e.key().unwrap_or_default().to_string(),
                    BackendError::new(
                        e.code().unwrap_or("Unknown"),
                        e.message().unwrap_or_default(),
                    ),
                )
            })
            .collect();

        if !failed.is_empty() {
            let error_keys: Vec<&str> = failed.iter().map(|(k, _)| k.as_str()).collect();
            tracing::warn!("Failed to delete some objects: {:?}", error_keys);
        }

        // Quiet mode only reports failures
        let deleted = keys
            .into_iter()
            .filter(|k| !failed.iter().any(|(f, _)| f == k))
            .collect();

        Ok(DeleteOutcome { deleted, failed })
    }

    async fn list_page(&self, bucket: &str, request: ListPageRequest) -> BackendResult<ListPage> {
        let mut builder = self.inner.list_objects_v2().bucket(bucket);

        if !request.prefix.is_empty() {
            builder = builder.prefix(&request.prefix);
        }
        if let Some(delimiter) = &request.delimiter {
            builder = builder.delimiter(delimiter);
        }
        if let Some(max) = request.max_keys {
            builder = builder.max_keys(max);
        }
        if let Some(token) = &request.continuation_token {
            builder = builder.continuation_token(token);
        }

        let response = builder.send().await.map_err(backend_error)?;

        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects: response.contents().iter().map(object_info).collect(),
            common_prefixes: response
                .common_prefixes()
                .iter()
                .filter_map(|p| p.prefix().map(str::to_string))
                .collect(),
            next_token,
        })
    }

    async fn download_to_file(&self, bucket: &str, key: &str, path: &Path) -> BackendResult<()> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;

        let part = part_path(path);
        let written = write_body(response.body, &part).await;
        commit(&part, path, written).await
    }

    async fn upload_from_file(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> BackendResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| BackendError::new("LocalIo", format!("{}: {e}", path.display())))?;

        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(())
    }
}

/// Build a store for `config`, connecting lazily with `profile`
pub fn store(profile: ConnectionProfile, config: StoreConfig) -> Result<Store<S3Backend>> {
    profile.validate()?;
    config.validate()?;
    Ok(S3Connector::new(profile).into_store(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::head_object::HeadObjectError;
    use aws_sdk_s3::primitives::DateTime;
    use aws_sdk_s3::types::{Object, ObjectStorageClass};
    use bk_core::Error;

    #[test]
    fn test_object_info_conversion() {
        let object = Object::builder()
            .key("data/a.csv")
            .size(2048)
            .e_tag("\"abc123\"")
            .storage_class(ObjectStorageClass::Standard)
            .last_modified(DateTime::from_secs(1_700_000_000))
            .build();

        let info = object_info(&object);
        assert_eq!(info.key, "data/a.csv");
        assert_eq!(info.size, 2048);
        assert_eq!(info.etag.as_deref(), Some("abc123"));
        assert_eq!(info.storage_class.as_deref(), Some("STANDARD"));
        assert_eq!(info.last_modified.map(|t| t.as_second()), Some(1_700_000_000));
        assert!(!info.is_dir);
    }

    #[test]
    fn test_trim_etag() {
        assert_eq!(trim_etag(Some("\"x\"")).as_deref(), Some("x"));
        assert_eq!(trim_etag(Some("\"\"")), None);
        assert_eq!(trim_etag(None), None);
    }

    #[test]
    fn test_backend_error_without_response() {
        let err: SdkError<HeadObjectError, HttpResponse> = SdkError::construction_failure("boom");
        let mapped = backend_error(err);
        assert_eq!(mapped.code, "Unknown");
        assert!(mapped.message.contains("boom"), "{}", mapped.message);
        assert!(!mapped.is_not_found());
    }

    #[tokio::test]
    async fn test_connect_with_static_endpoint() {
        let profile = ConnectionProfile::with_endpoint("http://127.0.0.1:9000", "ak", "sk");
        let backend = S3Backend::connect(&profile).await.unwrap();
        assert_eq!(
            backend.inner().config().region().map(|r| r.to_string()),
            Some(FALLBACK_REGION.to_string())
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_profile() {
        let profile = ConnectionProfile {
            access_key: Some("ak".into()),
            ..Default::default()
        };
        assert!(matches!(S3Backend::connect(&profile).await, Err(Error::Config(_))));
        assert!(matches!(
            store(profile, StoreConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_store_is_lazy() {
        let profile = ConnectionProfile::with_endpoint("http://127.0.0.1:9000", "ak", "sk");
        let config = StoreConfig::builder("bkt").build().unwrap();
        let store = store(profile, config).unwrap();
        assert!(!store.is_connected());
    }

    #[test]
    fn test_part_path_is_a_sibling() {
        assert_eq!(
            part_path(Path::new("/tmp/out/data.csv")),
            PathBuf::from("/tmp/out/data.csv.part")
        );
        assert_eq!(part_path(Path::new("a.csv")), PathBuf::from("a.csv.part"));
    }

    #[tokio::test]
    async fn test_commit_moves_complete_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let part = part_path(&path);
        std::fs::write(&part, "full body").unwrap();

        commit(&part, &path, Ok(())).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "full body");
        assert!(!part.exists());
    }

    #[tokio::test]
    async fn test_commit_discards_interrupted_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        let part = part_path(&path);
        std::fs::write(&part, "trunc").unwrap();

        let err = commit(&part, &path, Err(BackendError::new("StreamError", "reset")))
            .await
            .unwrap_err();
        assert_eq!(err.code, "StreamError");
        assert!(!part.exists());
        assert!(!path.exists());
    }
}
