//! bk-core: Core library for the bucketkit object storage toolkit
//!
//! This crate provides the storage-agnostic parts of bucketkit:
//! - Key resolution against a configured prefix
//! - Payload encoding and decoding (JSON, CSV, Parquet, spreadsheets)
//! - The [`Store`] facade over a pluggable [`Backend`]
//! - Tree building and rendering for listings
//! - Configuration and connection profiles
//!
//! The S3 implementation of [`Backend`] lives in `bk-s3`.

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod key;
pub mod profile;
pub mod store;
pub mod tree;

pub use backend::{Backend, DeleteOutcome, HeadInfo, ListPage, ListPageRequest, ObjectInfo};
pub use codec::{
    CodecOptions, CodecRegistry, FileType, FormatCodec, Frame, Loaded, Payload, PayloadCodec,
    TabularEngine, TextEncoding,
};
pub use config::{Config, ConfigManager, StoreConfig};
pub use error::{BackendError, Error, Result};
pub use key::OneOrMany;
pub use profile::ConnectionProfile;
pub use store::{ListOptions, Store};
pub use tree::{RenderOptions, TreeNode};
