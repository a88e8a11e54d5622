//! Error types for bk-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes,
//! plus the raw error shape reported by storage backends.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for bk-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes a backend reports for a missing object
const MISSING_OBJECT_CODES: &[&str] = &["NoSuchKey", "404", "NotFound"];

/// Error code a backend reports for a missing bucket
const MISSING_BUCKET_CODE: &str = "NoSuchBucket";

/// Error codes a backend reports for a permission failure
const ACCESS_DENIED_CODES: &[&str] = &["AccessDenied", "403"];

/// Error types for bk-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// An operation needed a bucket and none was configured or passed
    #[error("Bucket is not set. Pass a bucket or configure a default bucket")]
    BucketNotConfigured,

    /// Object or bucket does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend refused access
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Any other backend failure
    #[error("Storage error: {0}")]
    Store(String),

    /// No codec can handle the destination extension
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Unknown tabular engine requested
    #[error("Unsupported output type for tabular data: {0}")]
    UnsupportedOutputType(String),

    /// Upload source is missing or is not a regular file
    #[error("Local file not found: {}", .0.display())]
    LocalFileNotFound(PathBuf),

    /// Payload and key counts differ
    #[error("Payloads and keys must have the same length (got {payloads} vs {keys})")]
    LengthMismatch { payloads: usize, keys: usize },

    /// Malformed object key or local destination
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    /// Destination exists and overwrite is disabled
    #[error("Refusing to overwrite existing object: {0}")]
    RefuseOverwrite(String),

    /// A serialization engine was compiled out
    #[error("Missing optional capability: {0}")]
    MissingOptionalCapability(String),

    /// Configuration value or file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serializer failed on a payload
    #[error("Codec error: {0}")]
    Codec(String),

    /// Text not representable in the configured encoding
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::BucketNotConfigured
            | Error::Config(_)
            | Error::LengthMismatch { .. }
            | Error::InvalidDestination(_)
            | Error::LocalFileNotFound(_) => 2, // UsageError
            Error::Store(_) => 3,               // NetworkError
            Error::AccessDenied(_) => 4,        // AuthError
            Error::NotFound(_) => 5,            // NotFound
            Error::RefuseOverwrite(_) => 6,     // Conflict
            Error::UnsupportedFormat(_)
            | Error::UnsupportedOutputType(_)
            | Error::MissingOptionalCapability(_) => 7, // UnsupportedFeature
            _ => 1,                                     // GeneralError
        }
    }

    /// Translate a backend failure into the crate taxonomy
    ///
    /// `key` is only used to render the location in the message.
    pub fn from_backend(err: BackendError, bucket: &str, key: Option<&str>) -> Self {
        let path = match key {
            Some(k) => format!("s3://{bucket}/{k}"),
            None => format!("s3://{bucket}"),
        };

        if err.is_not_found() {
            Error::NotFound(format!("{path} ({}): {}", err.code, err.message))
        } else if err.is_access_denied() {
            Error::AccessDenied(format!("{path} ({}): {}", err.code, err.message))
        } else {
            Error::Store(format!("{path} ({}): {}", err.code, err.message))
        }
    }
}

/// Error as reported by a storage backend: a service code and a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    /// Service error code (`NoSuchKey`, `AccessDenied`, ...) or HTTP status
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the code denotes a missing object or bucket
    pub fn is_not_found(&self) -> bool {
        self.is_missing_object() || self.code == MISSING_BUCKET_CODE
    }

    /// Whether the code denotes a missing object in an existing bucket
    pub fn is_missing_object(&self) -> bool {
        MISSING_OBJECT_CODES.contains(&self.code.as_str())
    }

    /// Whether the code denotes a permission failure
    pub fn is_access_denied(&self) -> bool {
        ACCESS_DENIED_CODES.contains(&self.code.as_str())
    }
}
