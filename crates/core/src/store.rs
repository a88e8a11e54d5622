//! Object store facade
//!
//! [`Store`] resolves keys against the configured prefix, routes payloads
//! through [`PayloadCodec`] and issues requests through a [`Backend`]. The
//! backend client is created on first use and cached until
//! [`Store::reset_client`] drops it.
//!
//! Every operation runs its requests one after another in caller order.
//! Batch operations are not transactional: a failure leaves the effects of
//! earlier requests in place.

use std::fmt;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::backend::{Backend, ListPageRequest, MAX_DELETE_BATCH, ObjectInfo};
use crate::codec::{Body, Loaded, Payload, PayloadCodec, TabularEngine};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::filter::{self, KeyFilter};
use crate::key::{self, OneOrMany};
use crate::tree::TreeNode;

/// Page size ceiling accepted by S3 `ListObjectsV2`
const MAX_PAGE_KEYS: usize = 1000;

type Connect<B> = Box<dyn Fn() -> BoxFuture<'static, Result<B>> + Send + Sync>;

/// Options for [`Store::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Override the configured bucket
    pub bucket: Option<String>,
    /// Stop after this many entries
    pub limit: Option<usize>,
    /// List every level below the prefix; otherwise one level plus folders
    pub recursive: bool,
    /// Glob matched against whole keys (resolved against the key prefix)
    pub pattern: Option<String>,
    /// Keep only keys ending with one of these extensions
    pub extensions: Option<Vec<String>>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            bucket: None,
            limit: None,
            recursive: true,
            pattern: None,
            extensions: None,
        }
    }
}

/// Bucket-scoped convenience layer over a storage backend
pub struct Store<B> {
    config: StoreConfig,
    codec: PayloadCodec,
    client: OnceCell<B>,
    connect: Connect<B>,
}

impl<B: Backend> Store<B> {
    /// Create a store that connects through `connect` on first use
    pub fn new<F, Fut>(config: StoreConfig, connect: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<B>> + Send + 'static,
    {
        Self {
            config,
            codec: PayloadCodec::default(),
            client: OnceCell::new(),
            connect: Box::new(move || connect().boxed()),
        }
    }

    /// Create a store around an existing client
    ///
    /// After [`Store::reset_client`] there is nothing to reconnect to and
    /// operations fail with a configuration error.
    pub fn with_backend(config: StoreConfig, backend: B) -> Self {
        Self {
            config,
            codec: PayloadCodec::default(),
            client: OnceCell::new_with(Some(backend)),
            connect: Box::new(|| {
                async { Err(Error::Config("no connector for an injected backend".into())) }.boxed()
            }),
        }
    }

    /// Replace the configuration; the cached client is kept
    pub fn configure(&mut self, config: StoreConfig) -> Result<()> {
        config.validate()?;
        tracing::debug!(bucket = ?config.bucket, prefix = %config.key_prefix, "Store configured");
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn codec(&self) -> &PayloadCodec {
        &self.codec
    }

    /// Codec access, e.g. to register more formats
    pub fn codec_mut(&mut self) -> &mut PayloadCodec {
        &mut self.codec
    }

    /// Drop the cached client; the next operation reconnects
    pub fn reset_client(&mut self) {
        self.client = OnceCell::new();
    }

    /// Whether a client is currently cached
    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    /// Resolve a logical key against the configured prefix
    pub fn resolve(&self, key: &str) -> String {
        key::resolve(key, &self.config.key_prefix)
    }

    fn bucket<'a>(&'a self, bucket: Option<&'a str>) -> Result<&'a str> {
        bucket
            .or(self.config.bucket.as_deref())
            .filter(|b| !b.is_empty())
            .ok_or(Error::BucketNotConfigured)
    }

    async fn client(&self) -> Result<&B> {
        self.client
            .get_or_try_init(|| {
                tracing::debug!("Connecting storage client");
                (self.connect)()
            })
            .await
    }

    /// List objects under `prefix`
    ///
    /// Pages are followed until `limit` entries were collected or the listing
    /// is exhausted. Single-level listings also return the sub-folders as
    /// entries flagged `is_dir`.
    pub async fn list(&self, prefix: &str, options: &ListOptions) -> Result<Vec<ObjectInfo>> {
        let bucket = self.bucket(options.bucket.as_deref())?;

        let pattern = options.pattern.as_deref().map(|p| self.resolve(p));
        let (mut list_prefix, pattern) = match pattern {
            Some(p) if filter::has_glob(&p) => (filter::glob_base_dir(&p).to_string(), Some(p)),
            Some(p) => (p, None),
            None => (self.resolve(prefix), None),
        };
        if !options.recursive && !list_prefix.is_empty() && !list_prefix.ends_with('/') {
            list_prefix.push('/');
        }

        let filter = KeyFilter::new(pattern.as_deref(), options.extensions.as_deref())?;
        if options.limit == Some(0) {
            return Ok(Vec::new());
        }
        let client = self.client().await?;

        let mut out = Vec::new();
        let mut request = ListPageRequest {
            prefix: list_prefix,
            delimiter: (!options.recursive).then(|| "/".to_string()),
            continuation_token: None,
            max_keys: None,
        };

        loop {
            if filter.is_empty() {
                request.max_keys = options
                    .limit
                    .map(|l| l.saturating_sub(out.len()).min(MAX_PAGE_KEYS) as i32);
            }

            let page = client
                .list_page(bucket, request.clone())
                .await
                .map_err(|e| Error::from_backend(e, bucket, Some(request.prefix.as_str())))?;

            let folders = page.common_prefixes.into_iter().map(ObjectInfo::dir);
            for entry in page.objects.into_iter().chain(folders) {
                if !filter.matches(&entry.key) {
                    continue;
                }
                out.push(entry);
                if options.limit.is_some_and(|l| out.len() >= l) {
                    return Ok(out);
                }
            }

            match page.next_token {
                Some(token) => request.continuation_token = Some(token),
                None => break,
            }
        }

        tracing::debug!(bucket, prefix = %request.prefix, count = out.len(), "Listed objects");
        Ok(out)
    }

    /// Like [`Store::list`], keys only
    pub async fn list_keys(&self, prefix: &str, options: &ListOptions) -> Result<Vec<String>> {
        let objects = self.list(prefix, options).await?;
        Ok(objects.into_iter().map(|o| o.key).collect())
    }

    /// Every object below the folder `prefix`
    ///
    /// `data` selects `data/...` only, never siblings such as `data.csv` or
    /// `database/...`. An empty prefix selects the whole key prefix.
    pub async fn list_under(&self, prefix: &str, bucket: Option<&str>) -> Result<Vec<ObjectInfo>> {
        let base = folder_prefix(&self.resolve(prefix));
        let options = ListOptions {
            bucket: bucket.map(str::to_string),
            ..Default::default()
        };
        self.list(&base, &options).await
    }

    /// Whether an object exists; a missing object is `Ok(false)`
    pub async fn exists(&self, key: &str, bucket: Option<&str>) -> Result<bool> {
        let bucket = self.bucket(bucket)?;
        let key = self.resolve(key);
        let client = self.client().await?;
        self.object_exists(client, bucket, &key).await
    }

    async fn object_exists(&self, client: &B, bucket: &str, key: &str) -> Result<bool> {
        match client.head(bucket, key).await {
            Ok(_) => {
                tracing::info!("File exists: s3://{bucket}/{key}");
                Ok(true)
            }
            Err(e) if e.is_missing_object() => {
                tracing::info!("File does not exist: s3://{bucket}/{key}");
                Ok(false)
            }
            Err(e) => Err(Error::from_backend(e, bucket, Some(key))),
        }
    }

    /// Delete one or more objects
    ///
    /// Several keys are removed in batches of at most [`MAX_DELETE_BATCH`].
    /// A failing batch aborts the operation; earlier batches stay deleted.
    pub async fn delete(&self, keys: impl Into<OneOrMany<String>>, bucket: Option<&str>) -> Result<()> {
        let bucket = self.bucket(bucket)?;
        let keys: OneOrMany<String> = keys.into();
        let keys = key::normalize_many(&keys.into_vec(), &self.config.key_prefix);
        if keys.is_empty() {
            return Ok(());
        }
        let client = self.client().await?;

        if let [key] = keys.as_slice() {
            client
                .delete_one(bucket, key)
                .await
                .map_err(|e| Error::from_backend(e, bucket, Some(key.as_str())))?;
            tracing::info!("Deleted s3://{bucket}/{key}");
            return Ok(());
        }

        for (batch, chunk) in keys.chunks(MAX_DELETE_BATCH).enumerate() {
            let outcome = client
                .delete_many(bucket, chunk.to_vec())
                .await
                .map_err(|e| Error::from_backend(e, bucket, None))?;

            if let Some((key, err)) = outcome.failed.first() {
                tracing::warn!("Failed to delete {} objects in batch {}", outcome.failed.len(), batch + 1);
                return Err(Error::Store(format!(
                    "failed to delete {} of {} objects, first s3://{bucket}/{key}: {err}",
                    outcome.failed.len(),
                    chunk.len()
                )));
            }
            tracing::info!("Deleted {} objects from s3://{bucket} (batch {})", chunk.len(), batch + 1);
        }
        Ok(())
    }

    /// Download objects to local files
    ///
    /// Without `to`, files land in the working directory under their base
    /// name. A single key downloads to `to` itself unless it is an existing
    /// directory or ends with a separator. Several keys need `to` to be a
    /// directory. Existing files are kept when overwrite is disabled.
    pub async fn download(
        &self,
        keys: impl Into<OneOrMany<String>>,
        to: Option<&Path>,
        bucket: Option<&str>,
    ) -> Result<OneOrMany<PathBuf>> {
        let bucket = self.bucket(bucket)?;
        let keys: OneOrMany<String> = keys.into();
        let keys = key::normalize_many(&keys.into_vec(), &self.config.key_prefix);

        let multi = keys.len() > 1;
        if let Some(dest) = to {
            if multi && dest.extension().is_some() {
                return Err(Error::InvalidDestination(format!(
                    "{} must be a directory when downloading several keys",
                    dest.display()
                )));
            }
        }

        let mut paths = Vec::with_capacity(keys.len());
        for key in &keys {
            let name = key::basename(key);
            if name.is_empty() {
                return Err(Error::InvalidDestination(format!("{key} is a prefix, not an object")));
            }

            let path = match to {
                None => PathBuf::from(name),
                Some(dest) if multi || dest.is_dir() || ends_with_separator(dest) => dest.join(name),
                Some(dest) => dest.to_path_buf(),
            };

            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }

            if path.exists() && !self.config.overwrite {
                tracing::debug!(path = %path.display(), "Keeping existing file");
                paths.push(path);
                continue;
            }

            let client = self.client().await?;
            client
                .download_to_file(bucket, key, &path)
                .await
                .map_err(|e| Error::from_backend(e, bucket, Some(key.as_str())))?;
            tracing::info!("Downloaded s3://{bucket}/{key} to {}", path.display());
            paths.push(path);
        }

        Ok(OneOrMany::collapse(paths))
    }

    /// Fetch and decode objects according to their extensions
    ///
    /// Tabular formats become frames of `engine`, or of the configured
    /// output engine when `None`.
    pub async fn load(
        &self,
        keys: impl Into<OneOrMany<String>>,
        bucket: Option<&str>,
        engine: Option<TabularEngine>,
    ) -> Result<OneOrMany<Loaded>> {
        let bucket = self.bucket(bucket)?;
        let keys: OneOrMany<String> = keys.into();
        let keys = key::normalize_many(&keys.into_vec(), &self.config.key_prefix);
        let engine = engine.unwrap_or(self.config.output_engine);
        let options = self.config.codec_options();

        let mut out = Vec::with_capacity(keys.len());
        for key in &keys {
            let client = self.client().await?;
            let raw = client
                .get(bucket, key)
                .await
                .map_err(|e| Error::from_backend(e, bucket, Some(key.as_str())))?;
            tracing::info!("Loaded s3://{bucket}/{key}");

            let ext = key::extension(key);
            out.push(self.codec.decode(raw, ext.as_deref(), engine, &options)?);
        }

        Ok(OneOrMany::collapse(out))
    }

    /// Encode and upload payloads to keys, pairwise
    ///
    /// Returns the final keys, extensions inferred. With overwrite disabled
    /// each write is preceded by an existence check; that check and the
    /// write are two separate requests.
    pub async fn upload(
        &self,
        payloads: impl Into<OneOrMany<Payload>>,
        keys: impl Into<OneOrMany<String>>,
        bucket: Option<&str>,
        overwrite: Option<bool>,
    ) -> Result<OneOrMany<String>> {
        let bucket = self.bucket(bucket)?;
        let overwrite = overwrite.unwrap_or(self.config.overwrite);
        let payloads: OneOrMany<Payload> = payloads.into();
        let payloads = payloads.into_vec();
        let keys: OneOrMany<String> = keys.into();
        let keys = key::normalize_many(&keys.into_vec(), &self.config.key_prefix);

        if payloads.len() != keys.len() {
            return Err(Error::LengthMismatch {
                payloads: payloads.len(),
                keys: keys.len(),
            });
        }
        if let Some(key) = keys.iter().find(|k| k.is_empty() || k.ends_with('/')) {
            return Err(Error::InvalidDestination(format!(
                "'{key}' is not a full object key"
            )));
        }

        let options = self.config.codec_options();
        let mut final_keys = Vec::with_capacity(keys.len());
        for (payload, key) in payloads.iter().zip(&keys) {
            let encoded = self.codec.encode(payload, key, &options)?;
            let client = self.client().await?;

            if !overwrite && self.object_exists(client, bucket, &encoded.key).await? {
                return Err(Error::RefuseOverwrite(format!("s3://{bucket}/{}", encoded.key)));
            }

            let sent = match encoded.body {
                Body::File(path) => {
                    client
                        .upload_from_file(&path, bucket, &encoded.key, &encoded.content_type)
                        .await
                }
                Body::Bytes(data) => {
                    client
                        .put(bucket, &encoded.key, data, &encoded.content_type)
                        .await
                }
            };
            sent.map_err(|e| Error::from_backend(e, bucket, Some(encoded.key.as_str())))?;

            tracing::info!("Uploaded s3://{bucket}/{}", encoded.key);
            final_keys.push(encoded.key);
        }

        Ok(OneOrMany::collapse(final_keys))
    }

    /// Recursive listing of `prefix` as a size-aggregated tree
    ///
    /// The root is labelled `s3://bucket/prefix`.
    pub async fn tree(&self, prefix: &str, bucket: Option<&str>) -> Result<TreeNode> {
        let bucket = self.bucket(bucket)?;
        let resolved = self.resolve(prefix);
        let base = folder_prefix(&resolved);
        let objects = self.list_under(prefix, Some(bucket)).await?;

        let label = format!("s3://{bucket}/{resolved}");
        let label = label.trim_end_matches('/');

        let mut root = TreeNode::build(
            objects
                .iter()
                .filter_map(|o| o.key.strip_prefix(base.as_str()).map(|rel| (rel, o.size))),
            label,
        );
        root.aggregate_sizes();
        Ok(root)
    }
}

impl<B> fmt::Debug for Store<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .field("connected", &self.client.initialized())
            .finish()
    }
}

/// `prefix` as a folder: slash-terminated unless empty
///
/// Listing `data` would also match `database/...`; `data/` does not.
pub fn folder_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

fn ends_with_separator(path: &Path) -> bool {
    let s = path.as_os_str().to_string_lossy();
    s.ends_with('/') || s.ends_with(std::path::MAIN_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeleteOutcome, HeadInfo, ListPage, MockBackend};
    use crate::codec::{CsvCodec, FileType, Frame};
    use crate::error::BackendError;
    use arrow::array::{ArrayRef, Int64Array};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> StoreConfig {
        StoreConfig::builder("bkt").build().unwrap()
    }

    fn store(backend: MockBackend) -> Store<MockBackend> {
        Store::with_backend(config(), backend)
    }

    fn frame() -> Frame {
        Frame::from_columns(
            TabularEngine::PandasLike,
            [("n", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef)],
        )
        .unwrap()
    }

    fn no_such_key() -> BackendError {
        BackendError::new("NoSuchKey", "The specified key does not exist.")
    }

    #[tokio::test]
    async fn test_missing_bucket_fails_before_connecting() {
        let store = Store::with_backend(StoreConfig::default(), MockBackend::new());
        assert!(matches!(store.exists("a", None).await, Err(Error::BucketNotConfigured)));
        assert!(matches!(
            store.list("", &ListOptions::default()).await,
            Err(Error::BucketNotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_exists_maps_not_found_to_false() {
        let mut backend = MockBackend::new();
        backend
            .expect_head()
            .withf(|bucket, key| bucket == "bkt" && key == "missing.csv")
            .times(1)
            .returning(|_, _| Err(no_such_key()));
        backend
            .expect_head()
            .withf(|_, key| key == "there.csv")
            .returning(|_, _| Ok(HeadInfo::default()));
        backend
            .expect_head()
            .withf(|_, key| key == "secret.csv")
            .returning(|_, _| Err(BackendError::new("AccessDenied", "nope")));
        backend
            .expect_head()
            .withf(|_, key| key == "flaky.csv")
            .returning(|_, _| Err(BackendError::new("InternalError", "boom")));

        let store = store(backend);
        assert!(!store.exists("missing.csv", None).await.unwrap());
        assert!(store.exists("/there.csv", None).await.unwrap());
        assert!(matches!(
            store.exists("secret.csv", None).await,
            Err(Error::AccessDenied(_))
        ));
        assert!(matches!(store.exists("flaky.csv", None).await, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_delete_batches_of_thousand() {
        let mut backend = MockBackend::new();
        backend
            .expect_delete_many()
            .withf(|_, keys| keys.len() == 1000 && keys[0] == "p/k1")
            .times(1)
            .returning(|_, keys| {
                Ok(DeleteOutcome {
                    deleted: keys,
                    failed: Vec::new(),
                })
            });
        backend
            .expect_delete_many()
            .withf(|_, keys| keys.len() == 500 && keys[499] == "p/k1500")
            .times(1)
            .returning(|_, keys| {
                Ok(DeleteOutcome {
                    deleted: keys,
                    failed: Vec::new(),
                })
            });

        let mut store = store(backend);
        store
            .configure(StoreConfig::builder("bkt").key_prefix("p").build().unwrap())
            .unwrap();

        let keys: Vec<String> = (1..=1500).map(|i| format!("k{i}")).collect();
        store.delete(keys, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_single_key() {
        let mut backend = MockBackend::new();
        backend
            .expect_delete_one()
            .withf(|bucket, key| bucket == "other" && key == "a.csv")
            .times(1)
            .returning(|_, _| Ok(()));

        store(backend).delete("a.csv", Some("other")).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_partial_failure_is_an_error() {
        let mut backend = MockBackend::new();
        backend.expect_delete_many().times(1).returning(|_, keys| {
            Ok(DeleteOutcome {
                deleted: keys[1..].to_vec(),
                failed: vec![(keys[0].clone(), BackendError::new("AccessDenied", "no"))],
            })
        });

        let result = store(backend).delete(["a", "b", "c"], None).await;
        let Err(Error::Store(msg)) = result else {
            panic!("expected store error, got {result:?}");
        };
        assert!(msg.contains("s3://bkt/a"));
    }

    #[tokio::test]
    async fn test_upload_length_mismatch_issues_no_calls() {
        let store = store(MockBackend::new());
        let result = store
            .upload(vec![Payload::from(frame()), Payload::from(frame())], ["one"], None, None)
            .await;
        assert!(matches!(
            result,
            Err(Error::LengthMismatch { payloads: 2, keys: 1 })
        ));

        let result = store.upload(Payload::from(frame()), Vec::<String>::new(), None, None).await;
        assert!(matches!(result, Err(Error::LengthMismatch { .. })));
    }

    #[tokio::test]
    async fn test_upload_rejects_prefix_destination() {
        let store = store(MockBackend::new());
        let result = store.upload(Payload::from(frame()), "folder/", None, None).await;
        assert!(matches!(result, Err(Error::InvalidDestination(_))));
    }

    #[tokio::test]
    async fn test_upload_refuses_existing_inferred_key() {
        let mut backend = MockBackend::new();
        backend
            .expect_head()
            .withf(|_, key| key == "data.parquet")
            .times(1)
            .returning(|_, _| Ok(HeadInfo::default()));

        let result = store(backend)
            .upload(Payload::from(frame()), "data", None, Some(false))
            .await;
        assert!(matches!(result, Err(Error::RefuseOverwrite(ref k)) if k == "s3://bkt/data.parquet"));
    }

    #[tokio::test]
    async fn test_upload_writes_when_absent() {
        let mut backend = MockBackend::new();
        backend
            .expect_head()
            .times(1)
            .returning(|_, _| Err(BackendError::new("404", "")));
        backend
            .expect_put()
            .withf(|bucket, key, data, content_type| {
                bucket == "bkt" && key == "data.csv" && data.starts_with(b"n\n") && content_type == "text/csv"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let mut store = store(backend);
        store
            .configure(
                StoreConfig::builder("bkt")
                    .default_file_type(FileType::Csv)
                    .overwrite(false)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let key = store.upload(Payload::from(frame()), "data", None, None).await.unwrap();
        assert_eq!(key, OneOrMany::One("data.csv".to_string()));
    }

    #[tokio::test]
    async fn test_upload_local_file_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "hello").unwrap();

        let mut backend = MockBackend::new();
        let expected = path.clone();
        backend
            .expect_upload_from_file()
            .withf(move |p, _, key, content_type| {
                p == expected.as_path() && key == "docs/report.txt" && content_type == "text/plain"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        backend
            .expect_put()
            .withf(|_, key, _, content_type| key == "docs/meta.json" && content_type == "application/json")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let record = serde_json::json!({"rows": 3}).as_object().cloned().unwrap();
        let keys = store(backend)
            .upload(
                vec![Payload::file(&path), Payload::Record(record)],
                ["docs/report.txt", "docs/meta"],
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            keys.into_vec(),
            vec!["docs/report.txt".to_string(), "docs/meta.json".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_single_level() {
        let mut backend = MockBackend::new();
        backend
            .expect_list_page()
            .withf(|_, req| req.prefix == "a/" && req.delimiter.as_deref() == Some("/"))
            .times(1)
            .returning(|_, _| {
                Ok(ListPage {
                    objects: vec![ObjectInfo::file("a/x.txt", 1), ObjectInfo::file("a/z.txt", 2)],
                    common_prefixes: vec!["a/b/".to_string()],
                    next_token: None,
                })
            });

        let options = ListOptions {
            recursive: false,
            ..Default::default()
        };
        let entries = store(backend).list("a", &options).await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a/x.txt", "a/z.txt", "a/b/"]);
        assert!(entries[2].is_dir);
        assert!(!keys.contains(&"a/b/y.txt"));
    }

    #[tokio::test]
    async fn test_list_follows_pages_until_limit() {
        let mut backend = MockBackend::new();
        backend
            .expect_list_page()
            .withf(|_, req| req.continuation_token.is_none())
            .times(1)
            .returning(|_, _| {
                Ok(ListPage {
                    objects: vec![ObjectInfo::file("k1", 1), ObjectInfo::file("k2", 1)],
                    common_prefixes: Vec::new(),
                    next_token: Some("t1".to_string()),
                })
            });
        backend
            .expect_list_page()
            .withf(|_, req| req.continuation_token.as_deref() == Some("t1"))
            .times(1)
            .returning(|_, _| {
                Ok(ListPage {
                    objects: vec![ObjectInfo::file("k3", 1), ObjectInfo::file("k4", 1)],
                    common_prefixes: Vec::new(),
                    next_token: Some("t2".to_string()),
                })
            });

        let options = ListOptions {
            limit: Some(3),
            ..Default::default()
        };
        let keys = store(backend).list_keys("", &options).await.unwrap();
        assert_eq!(keys, vec!["k1", "k2", "k3"]);
    }

    #[tokio::test]
    async fn test_list_with_pattern_and_extensions() {
        let mut backend = MockBackend::new();
        backend
            .expect_list_page()
            .withf(|_, req| req.prefix == "raw/" && req.max_keys.is_none())
            .times(1)
            .returning(|_, _| {
                Ok(ListPage {
                    objects: vec![
                        ObjectInfo::file("raw/2024/a.csv", 1),
                        ObjectInfo::file("raw/2024/b.CSV", 1),
                        ObjectInfo::file("raw/2023/c.csv", 1),
                        ObjectInfo::file("raw/2024/d.json", 1),
                    ],
                    common_prefixes: Vec::new(),
                    next_token: None,
                })
            });

        let options = ListOptions {
            pattern: Some("raw/2024*".to_string()),
            extensions: Some(vec!["csv".to_string()]),
            ..Default::default()
        };
        let keys = store(backend).list_keys("ignored", &options).await.unwrap();
        assert_eq!(keys, vec!["raw/2024/a.csv", "raw/2024/b.CSV"]);
    }

    #[tokio::test]
    async fn test_load_decodes_by_extension() {
        let mut backend = MockBackend::new();
        backend
            .expect_get()
            .withf(|_, key| key == "t/a.csv")
            .returning(|_, _| Ok(b"x,y\n1,2\n3,4\n".to_vec()));
        backend
            .expect_get()
            .withf(|_, key| key == "t/m.json")
            .returning(|_, _| Ok(br#"{"k": [1, 2]}"#.to_vec()));
        backend
            .expect_get()
            .withf(|_, key| key == "t/blob.bin")
            .returning(|_, _| Ok(vec![0, 159]));

        let mut store = store(backend);
        store
            .configure(StoreConfig::builder("bkt").key_prefix("t/").build().unwrap())
            .unwrap();

        let loaded = store
            .load(["a.csv", "m.json", "blob.bin"], None, Some(TabularEngine::PolarsLike))
            .await
            .unwrap()
            .into_vec();
        let frame = loaded[0].as_frame().unwrap();
        assert_eq!(frame.shape(), (2, 2));
        assert_eq!(frame.engine(), TabularEngine::PolarsLike);
        assert_eq!(loaded[1].as_record(), Some(&serde_json::json!({"k": [1, 2]})));
        assert_eq!(loaded[2].as_raw(), Some(&[0u8, 159][..]));

        let single = store.load("a.csv", None, None).await.unwrap();
        let OneOrMany::One(Loaded::Frame(frame)) = single else {
            panic!("expected a single frame");
        };
        assert_eq!(frame.engine(), TabularEngine::PandasLike);
    }

    #[tokio::test]
    async fn test_load_missing_key() {
        let mut backend = MockBackend::new();
        backend.expect_get().returning(|_, _| Err(no_such_key()));
        let result = store(backend).load("gone.csv", None, None).await;
        assert!(matches!(result, Err(Error::NotFound(ref m)) if m.contains("s3://bkt/gone.csv")));
    }

    #[tokio::test]
    async fn test_download_several_keys_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");

        let mut backend = MockBackend::new();
        backend
            .expect_download_to_file()
            .times(2)
            .returning(|_, key, path| {
                std::fs::write(path, key).unwrap();
                Ok(())
            });

        let paths = store(backend)
            .download(["x/a.csv", "y/b.csv"], Some(&dest), None)
            .await
            .unwrap()
            .into_vec();
        assert_eq!(paths, vec![dest.join("a.csv"), dest.join("b.csv")]);
        assert_eq!(std::fs::read_to_string(dest.join("b.csv")).unwrap(), "y/b.csv");
    }

    #[tokio::test]
    async fn test_download_several_keys_to_file_path() {
        let store = store(MockBackend::new());
        let result = store
            .download(["a.csv", "b.csv"], Some(Path::new("out/data.csv")), None)
            .await;
        assert!(matches!(result, Err(Error::InvalidDestination(_))));
    }

    #[tokio::test]
    async fn test_download_keeps_existing_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("local.csv");
        std::fs::write(&dest, "old").unwrap();

        let mut store = store(MockBackend::new());
        store
            .configure(StoreConfig::builder("bkt").overwrite(false).build().unwrap())
            .unwrap();

        let path = store.download("a.csv", Some(&dest), None).await.unwrap();
        assert_eq!(path, OneOrMany::One(dest.clone()));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_client_is_created_once_and_reset() {
        let connects = Arc::new(AtomicUsize::new(0));
        let counter = connects.clone();
        let mut store = Store::new(config(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut backend = MockBackend::new();
            backend.expect_head().returning(|_, _| Ok(HeadInfo::default()));
            async move { Ok(backend) }
        });

        assert!(!store.is_connected());
        store.exists("a", None).await.unwrap();
        store.exists("b", None).await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        store.reset_client();
        assert!(!store.is_connected());
        store.exists("c", None).await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tree_strips_listing_prefix() {
        let mut backend = MockBackend::new();
        backend
            .expect_list_page()
            .withf(|_, req| req.prefix == "data/" && req.delimiter.is_none())
            .returning(|_, _| {
                Ok(ListPage {
                    objects: vec![
                        ObjectInfo::file("data/a/1.csv", 100),
                        ObjectInfo::file("data/a/2.csv", 50),
                        ObjectInfo::file("data/b.csv", 10),
                    ],
                    common_prefixes: Vec::new(),
                    next_token: None,
                })
            });

        let root = store(backend).tree("data", None).await.unwrap();
        assert_eq!(root.name, "s3://bkt/data");
        assert_eq!(root.size, 160);
        assert_eq!(root.children["a"].size, 150);
        assert_eq!(root.children["a"].children["1.csv"].full_path, "a/1.csv");
    }

    /// Backend that answers listings with string-prefix semantics
    fn prefix_listing(keys: &'static [(&'static str, u64)]) -> MockBackend {
        let mut backend = MockBackend::new();
        backend.expect_list_page().returning(move |_, req| {
            Ok(ListPage {
                objects: keys
                    .iter()
                    .filter(|(k, _)| k.starts_with(req.prefix.as_str()))
                    .map(|(k, size)| ObjectInfo::file(*k, *size))
                    .collect(),
                common_prefixes: Vec::new(),
                next_token: None,
            })
        });
        backend
    }

    #[tokio::test]
    async fn test_tree_ignores_sibling_prefixes() {
        let backend = prefix_listing(&[
            ("data/a.csv", 10),
            ("data.csv", 5),
            ("database/secret.csv", 1000),
        ]);

        let root = store(backend).tree("data", None).await.unwrap();
        assert_eq!(root.name, "s3://bkt/data");
        assert_eq!(root.size, 10);
        let children: Vec<&str> = root.children.keys().map(String::as_str).collect();
        assert_eq!(children, vec!["a.csv"]);
    }

    #[tokio::test]
    async fn test_tree_of_whole_bucket() {
        let backend = prefix_listing(&[("data/a.csv", 10), ("database/secret.csv", 1000)]);

        let root = store(backend).tree("", None).await.unwrap();
        assert_eq!(root.name, "s3://bkt");
        assert_eq!(root.size, 1010);
    }

    #[tokio::test]
    async fn test_list_under_stays_inside_folder() {
        let backend = prefix_listing(&[
            ("p/data/a.csv", 1),
            ("p/data/b/c.csv", 1),
            ("p/data.csv", 1),
            ("p/database/x", 1),
        ]);
        let mut store = store(backend);
        store
            .configure(StoreConfig::builder("bkt").key_prefix("p").build().unwrap())
            .unwrap();

        let keys: Vec<String> = store
            .list_under("data", None)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["p/data/a.csv", "p/data/b/c.csv"]);

        let all = store.list_under("", None).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_folder_prefix() {
        assert_eq!(folder_prefix(""), "");
        assert_eq!(folder_prefix("data"), "data/");
        assert_eq!(folder_prefix("data/"), "data/");
    }

    #[tokio::test]
    async fn test_exists_missing_bucket_is_an_error() {
        let mut backend = MockBackend::new();
        backend
            .expect_head()
            .times(1)
            .returning(|_, _| Err(BackendError::new("NoSuchBucket", "The specified bucket does not exist")));

        let result = store(backend).exists("a.csv", Some("typo")).await;
        assert!(matches!(result, Err(Error::NotFound(ref m)) if m.contains("s3://typo/a.csv")));
    }

    #[tokio::test]
    async fn test_registered_codec_is_used_for_load() {
        let mut backend = MockBackend::new();
        backend
            .expect_get()
            .withf(|_, key| key == "export.dat")
            .times(2)
            .returning(|_, _| Ok(b"id,name\n1,a\n".to_vec()));

        let mut store = store(backend);
        let loaded = store.load("export.dat", None, None).await.unwrap();
        assert!(matches!(loaded, OneOrMany::One(Loaded::Raw(_))));

        store.codec_mut().registry_mut().register(".dat", Arc::new(CsvCodec));
        assert!(store.codec().registry().extensions().contains(&".dat"));

        let loaded = store.load("export.dat", None, None).await.unwrap();
        let OneOrMany::One(Loaded::Frame(frame)) = loaded else {
            panic!("expected a frame");
        };
        assert_eq!(frame.shape(), (1, 2));
    }
}
