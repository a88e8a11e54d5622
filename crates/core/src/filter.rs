//! Listing filters: glob patterns and extension sets

use std::collections::BTreeSet;

use glob::Pattern;

use crate::error::{Error, Result};

/// Whether `s` contains a `*` or `?` wildcard
pub fn has_glob(s: &str) -> bool {
    s.contains(['*', '?'])
}

/// Directory part of a pattern before its first wildcard, with trailing `/`
///
/// `raw/2024-*/x.csv` gives `raw/`; `*.csv` gives an empty string.
pub fn glob_base_dir(pattern: &str) -> &str {
    let head = match pattern.find(['*', '?']) {
        Some(pos) => &pattern[..pos],
        None => pattern,
    };
    match head.rfind('/') {
        Some(pos) => &pattern[..=pos],
        None => "",
    }
}

/// Lower-case extensions with a leading dot; empty entries are dropped
pub fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> BTreeSet<String> {
    extensions
        .iter()
        .map(|e| e.as_ref().trim().to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e != ".")
        .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
        .collect()
}

/// Predicate applied to each listed key
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    pattern: Option<Pattern>,
    extensions: Option<BTreeSet<String>>,
}

impl KeyFilter {
    /// `pattern` is matched against the whole key; `*` and `?` also match `/`
    pub fn new(pattern: Option<&str>, extensions: Option<&[String]>) -> Result<Self> {
        let pattern = pattern
            .map(|p| Pattern::new(p).map_err(|e| Error::Config(format!("invalid pattern '{p}': {e}"))))
            .transpose()?;
        let extensions = extensions.map(normalize_extensions);
        Ok(Self { pattern, extensions })
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_none() && self.extensions.is_none()
    }

    pub fn matches(&self, key: &str) -> bool {
        if let Some(pattern) = &self.pattern {
            if !pattern.matches(key) {
                return false;
            }
        }
        if let Some(extensions) = &self.extensions {
            let lower = key.to_ascii_lowercase();
            if !extensions.iter().any(|e| lower.ends_with(e.as_str())) {
                return false;
            }
        }
        true
    }
}
