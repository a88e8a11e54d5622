//! Text encodings for JSON and CSV payloads

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Character encoding used for text payloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8", alias = "UTF-8")]
    Utf8,
    #[serde(
        rename = "latin-1",
        alias = "latin1",
        alias = "iso-8859-1",
        alias = "ISO-8859-1"
    )]
    Latin1,
    #[serde(rename = "ascii", alias = "us-ascii", alias = "ASCII")]
    Ascii,
}

impl TextEncoding {
    /// Encode text into bytes
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => narrow(text, 0xFF, self),
            TextEncoding::Ascii => narrow(text, 0x7F, self),
        }
    }

    /// Decode bytes into text
    pub fn decode(self, raw: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(raw.to_vec())
                .map_err(|e| Error::Encoding(format!("invalid utf-8: {e}"))),
            TextEncoding::Latin1 => Ok(raw.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Ascii => match raw.iter().position(|b| !b.is_ascii()) {
                Some(pos) => Err(Error::Encoding(format!(
                    "byte 0x{:02x} at offset {pos} is not ascii",
                    raw[pos]
                ))),
                None => Ok(raw.iter().map(|&b| char::from(b)).collect()),
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Ascii => "ascii",
        }
    }
}

fn narrow(text: &str, max: u32, encoding: TextEncoding) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(c as u32)
                .ok()
                .filter(|b| u32::from(*b) <= max)
                .ok_or_else(|| {
                    Error::Encoding(format!("character {c:?} cannot be encoded as {encoding}"))
                })
        })
        .collect()
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            other => Err(Error::Config(format!("unsupported text encoding: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("UTF_8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert_eq!("ISO-8859-1".parse::<TextEncoding>().unwrap(), TextEncoding::Latin1);
        assert!("cp1252".parse::<TextEncoding>().is_err());
    }

    #[test]
    fn test_latin1_roundtrip() {
        let bytes = TextEncoding::Latin1.encode("café").unwrap();
        assert_eq!(bytes, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(TextEncoding::Latin1.decode(&bytes).unwrap(), "café");
    }

    #[test]
    fn test_unrepresentable_characters_fail() {
        assert!(matches!(
            TextEncoding::Latin1.encode("€"),
            Err(Error::Encoding(_))
        ));
        assert!(matches!(
            TextEncoding::Ascii.encode("é"),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_invalid_input_bytes_fail() {
        assert!(TextEncoding::Utf8.decode(&[0xFF, 0xFE]).is_err());
        assert!(TextEncoding::Ascii.decode(&[b'a', 0x80]).is_err());
    }
}
