//! Payload codecs
//!
//! Maps a logical payload and a destination key to serialized bytes plus a
//! content type, and maps fetched bytes back to a typed value. The extension
//! of the final key decides the format; a missing extension is filled in
//! from configured defaults before anything is sent.

mod csv;
#[cfg(feature = "excel")]
mod excel;
mod frame;
mod json;
mod parquet;
mod text;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::key::{self, OneOrMany};

pub use self::csv::CsvCodec;
#[cfg(feature = "excel")]
pub use self::excel::ExcelCodec;
pub use self::frame::{FileType, Frame, TabularEngine};
pub use self::parquet::ParquetCodec;
pub use self::text::TextEncoding;

/// Something that can be uploaded
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A file on the local filesystem, sent as-is
    LocalFile(PathBuf),
    /// An ordered key/value mapping, serialized as JSON
    Record(Map<String, Value>),
    /// A table, serialized according to the destination extension
    Frame(Frame),
}

/// Discriminant of [`Payload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    LocalFile,
    Record,
    Frame,
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::LocalFile(_) => PayloadKind::LocalFile,
            Payload::Record(_) => PayloadKind::Record,
            Payload::Frame(_) => PayloadKind::Frame,
        }
    }

    /// Reference a local file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Payload::LocalFile(path.into())
    }
}

impl From<Frame> for Payload {
    fn from(frame: Frame) -> Self {
        Payload::Frame(frame)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(record: Map<String, Value>) -> Self {
        Payload::Record(record)
    }
}

impl From<PathBuf> for Payload {
    fn from(path: PathBuf) -> Self {
        Payload::LocalFile(path)
    }
}

impl From<&Path> for Payload {
    fn from(path: &Path) -> Self {
        Payload::LocalFile(path.to_path_buf())
    }
}

impl From<Payload> for OneOrMany<Payload> {
    fn from(payload: Payload) -> Self {
        OneOrMany::One(payload)
    }
}

impl From<Vec<Payload>> for OneOrMany<Payload> {
    fn from(payloads: Vec<Payload>) -> Self {
        OneOrMany::Many(payloads)
    }
}

/// Serialized upload body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Stream this local file
    File(PathBuf),
    /// Send these bytes
    Bytes(Vec<u8>),
}

/// Output of [`PayloadCodec::encode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// Destination key after extension inference
    pub key: String,
    pub body: Body,
    pub content_type: String,
}

/// Output of [`PayloadCodec::decode`]
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    /// Parsed JSON mapping or sequence
    Record(Value),
    /// Parsed table
    Frame(Frame),
    /// Unrecognized extension, bytes as fetched
    Raw(Vec<u8>),
}

impl Loaded {
    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            Loaded::Frame(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Value> {
        match self {
            Loaded::Record(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Loaded::Raw(b) => Some(b),
            _ => None,
        }
    }
}

/// Serialization settings taken from the store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    /// Format used for frames uploaded to a key without extension
    pub default_file_type: FileType,
    /// CSV field separator
    pub csv_separator: u8,
    /// Write a row-number column to CSV for index-carrying engines
    pub include_index: bool,
    /// Encoding of JSON and CSV text
    pub encoding: TextEncoding,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            default_file_type: FileType::Parquet,
            csv_separator: b',',
            include_index: false,
            encoding: TextEncoding::Utf8,
        }
    }
}

/// A tabular file format
pub trait FormatCodec: Send + Sync {
    /// MIME type sent with encoded objects
    fn content_type(&self) -> &'static str;

    /// Serialize a frame
    fn encode(&self, frame: &Frame, options: &CodecOptions) -> Result<Vec<u8>>;

    /// Parse bytes into a frame of the given engine
    fn decode(&self, raw: &[u8], engine: TabularEngine, options: &CodecOptions) -> Result<Frame>;
}

/// Extension → tabular codec lookup table
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn FormatCodec>>,
}

impl CodecRegistry {
    /// A registry with no formats
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Register a codec for an extension, replacing any previous one
    pub fn register(&mut self, extension: &str, codec: Arc<dyn FormatCodec>) {
        self.codecs.insert(normalize_extension(extension), codec);
    }

    /// Codec for an extension (with or without the dot, any case)
    pub fn get(&self, extension: &str) -> Option<&Arc<dyn FormatCodec>> {
        self.codecs.get(&normalize_extension(extension))
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(".csv", Arc::new(CsvCodec));
        registry.register(".parquet", Arc::new(ParquetCodec));
        register_spreadsheets(&mut registry);
        registry
    }
}

#[cfg(feature = "excel")]
fn register_spreadsheets(registry: &mut CodecRegistry) {
    registry.register(".xlsx", Arc::new(ExcelCodec::xlsx()));
    registry.register(".xls", Arc::new(ExcelCodec::xls()));
}

#[cfg(not(feature = "excel"))]
fn register_spreadsheets(registry: &mut CodecRegistry) {
    registry.register(".xlsx", Arc::new(Unavailable("xlsx")));
    registry.register(".xls", Arc::new(Unavailable("xls")));
}

/// Placeholder for a format whose engine was compiled out
#[cfg(not(feature = "excel"))]
struct Unavailable(&'static str);

#[cfg(not(feature = "excel"))]
impl FormatCodec for Unavailable {
    fn content_type(&self) -> &'static str {
        "application/octet-stream"
    }

    fn encode(&self, _frame: &Frame, _options: &CodecOptions) -> Result<Vec<u8>> {
        Err(self.missing())
    }

    fn decode(&self, _raw: &[u8], _engine: TabularEngine, _options: &CodecOptions) -> Result<Frame> {
        Err(self.missing())
    }
}

#[cfg(not(feature = "excel"))]
impl Unavailable {
    fn missing(&self) -> Error {
        Error::MissingOptionalCapability(format!(
            "{} support requires building bk-core with the `excel` feature",
            self.0
        ))
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

fn normalize_extension(extension: &str) -> String {
    let ext = extension.to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Payload ⇄ bytes dispatch
#[derive(Debug, Clone, Default)]
pub struct PayloadCodec {
    registry: CodecRegistry,
}

impl PayloadCodec {
    pub fn new(registry: CodecRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CodecRegistry {
        &mut self.registry
    }

    /// Serialize a payload for `dest_key`
    ///
    /// Pure with respect to the backend: every format failure surfaces here,
    /// before any request is issued.
    pub fn encode(&self, payload: &Payload, dest_key: &str, options: &CodecOptions) -> Result<Encoded> {
        match payload {
            Payload::LocalFile(path) => {
                if !path.is_file() {
                    return Err(Error::LocalFileNotFound(path.clone()));
                }
                let content_type = mime_guess::from_path(dest_key)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string();
                Ok(Encoded {
                    key: dest_key.to_string(),
                    body: Body::File(path.clone()),
                    content_type,
                })
            }
            Payload::Record(record) => {
                let key = match key::extension(dest_key) {
                    Some(_) => dest_key.to_string(),
                    None => format!("{dest_key}.json"),
                };
                Ok(Encoded {
                    key,
                    body: Body::Bytes(json::encode(record, options.encoding)?),
                    content_type: json::CONTENT_TYPE.to_string(),
                })
            }
            Payload::Frame(frame) => {
                let (key, ext) = match key::extension(dest_key) {
                    Some(ext) => (dest_key.to_string(), ext),
                    None => {
                        let ext = options.default_file_type.extension();
                        (format!("{dest_key}{ext}"), ext.to_string())
                    }
                };
                let codec = self
                    .registry
                    .get(&ext)
                    .ok_or_else(|| Error::UnsupportedFormat(format!("{ext} for tabular data")))?;

                tracing::debug!(key = %key, ext = %ext, engine = %frame.engine(), "Encoding frame");
                Ok(Encoded {
                    body: Body::Bytes(codec.encode(frame, options)?),
                    content_type: codec.content_type().to_string(),
                    key,
                })
            }
        }
    }

    /// Parse fetched bytes according to the key extension
    ///
    /// `.json` yields a record, registered tabular extensions yield a frame
    /// of `engine`, anything else comes back as raw bytes.
    pub fn decode(
        &self,
        raw: Vec<u8>,
        extension: Option<&str>,
        engine: TabularEngine,
        options: &CodecOptions,
    ) -> Result<Loaded> {
        let Some(ext) = extension.map(normalize_extension) else {
            return Ok(Loaded::Raw(raw));
        };

        if ext == ".json" {
            return Ok(Loaded::Record(json::decode(&raw, options.encoding)?));
        }

        match self.registry.get(&ext) {
            Some(codec) => Ok(Loaded::Frame(codec.decode(&raw, engine, options)?)),
            None => Ok(Loaded::Raw(raw)),
        }
    }
}
