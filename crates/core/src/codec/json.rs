//! Structured record serialization

use serde_json::{Map, Value};

use super::text::TextEncoding;
use crate::error::Result;

pub const CONTENT_TYPE: &str = "application/json";

/// Serialize a record as indented JSON text, keys in insertion order
pub fn encode(record: &Map<String, Value>, encoding: TextEncoding) -> Result<Vec<u8>> {
    let text = serde_json::to_string_pretty(record)?;
    encoding.encode(&text)
}

/// Parse JSON text into a mapping or sequence value
pub fn decode(raw: &[u8], encoding: TextEncoding) -> Result<Value> {
    let text = encoding.decode(raw)?;
    Ok(serde_json::from_str(&text)?)
}
