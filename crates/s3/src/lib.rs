//! bk-s3: S3 SDK adapter for bucketkit
//!
//! This crate provides the implementation of the [`bk_core::Backend`] trait
//! using the aws-sdk-s3 crate. It is the only crate that directly
//! depends on the AWS SDK.

pub mod client;

pub use client::{S3Backend, S3Connector, store};
