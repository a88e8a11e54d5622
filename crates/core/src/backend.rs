//! Backend contract
//!
//! The object store facade talks to storage only through this trait. The S3
//! adapter implements it on top of the AWS SDK; tests mock it.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Result of a backend call, before translation into the crate taxonomy
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Largest key batch a single `delete_many` call accepts
pub const MAX_DELETE_BATCH: usize = 1000;

/// Metadata for one listed object, or a virtual folder on single-level listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Full object key
    pub key: String,

    /// Size in bytes (0 for virtual folders)
    pub size: u64,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<jiff::Timestamp>,

    /// ETag without surrounding quotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Storage class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Whether this is a common prefix rather than an object
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_dir: bool,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for an object
    pub fn file(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
            storage_class: None,
            is_dir: false,
        }
    }

    /// Create a new ObjectInfo for a common prefix
    pub fn dir(key: impl Into<String>) -> Self {
        Self {
            is_dir: true,
            ..Self::file(key, 0)
        }
    }
}

/// Metadata returned by a `head` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadInfo {
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<jiff::Timestamp>,
}

/// One page request of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPageRequest {
    /// Key prefix to filter by
    pub prefix: String,

    /// Delimiter for single-level listings (usually "/")
    pub delimiter: Option<String>,

    /// Continuation token returned by the previous page
    pub continuation_token: Option<String>,

    /// Maximum number of keys per page
    pub max_keys: Option<i32>,
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Objects directly returned by the page
    pub objects: Vec<ObjectInfo>,

    /// Common prefixes (only with a delimiter)
    pub common_prefixes: Vec<String>,

    /// Token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

/// Per-key outcome of a batch delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Keys the backend reports as deleted
    pub deleted: Vec<String>,

    /// Keys that failed, with the backend error for each
    pub failed: Vec<(String, BackendError)>,
}

/// Storage operations the facade relies on
///
/// Implementations report failures as [`BackendError`] carrying the service
/// code; the facade maps codes into [`crate::Error`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Probe object metadata
    async fn head(&self, bucket: &str, key: &str) -> BackendResult<HeadInfo>;

    /// Fetch object content
    async fn get(&self, bucket: &str, key: &str) -> BackendResult<Vec<u8>>;

    /// Store object content
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()>;

    /// Delete a single object
    async fn delete_one(&self, bucket: &str, key: &str) -> BackendResult<()>;

    /// Delete up to [`MAX_DELETE_BATCH`] objects in one request
    async fn delete_many(&self, bucket: &str, keys: Vec<String>) -> BackendResult<DeleteOutcome>;

    /// Fetch one page of a listing
    async fn list_page(&self, bucket: &str, request: ListPageRequest) -> BackendResult<ListPage>;

    /// Stream an object into a local file
    async fn download_to_file(&self, bucket: &str, key: &str, path: &Path) -> BackendResult<()>;

    /// Stream a local file into an object
    async fn upload_from_file(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> BackendResult<()>;
}
