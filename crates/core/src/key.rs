//! Key resolution
//!
//! Logical keys supplied by callers are resolved against the configured key
//! prefix before they reach the backend. Resolution is pure string work.

use serde::Serialize;

/// Resolve a logical key against a prefix
///
/// Leading slashes are stripped from `key`. A key that already lives under the
/// prefix is returned unchanged, so resolving twice yields the same key.
pub fn resolve(key: &str, prefix: &str) -> String {
    let key = key.trim_start_matches('/');
    if prefix.is_empty() {
        return key.to_string();
    }

    let base = prefix.trim_matches('/');
    if base.is_empty() {
        return key.to_string();
    }

    if key == base || key.strip_prefix(base).is_some_and(|rest| rest.starts_with('/')) {
        return key.to_string();
    }

    format!("{base}/{key}")
}

/// Resolve each key of a sequence against a prefix, preserving order
pub fn normalize_many<S: AsRef<str>>(keys: &[S], prefix: &str) -> Vec<String> {
    keys.iter().map(|k| resolve(k.as_ref(), prefix)).collect()
}

/// Lower-cased extension of the last key segment, including the dot
///
/// Returns `None` for keys without an extension, dot-files (`.env`) and
/// names ending with a bare dot.
pub fn extension(key: &str) -> Option<String> {
    let name = basename(key);
    let pos = name.rfind('.')?;
    if pos == 0 || pos + 1 == name.len() {
        return None;
    }
    Some(name[pos..].to_ascii_lowercase())
}

/// Last `/`-separated segment of a key
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// A single value or a sequence of values
///
/// Facade operations accept one key or many, and hand back a scalar when
/// exactly one result was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Number of contained values
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into a vector
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }

    /// The single value, if exactly one is held
    pub fn into_single(self) -> Option<T> {
        match self {
            OneOrMany::One(v) => Some(v),
            OneOrMany::Many(mut v) if v.len() == 1 => v.pop(),
            OneOrMany::Many(_) => None,
        }
    }

    /// Collapse a result vector: one element becomes `One`
    pub fn collapse(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            if let Some(v) = values.pop() {
                return OneOrMany::One(v);
            }
        }
        OneOrMany::Many(values)
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<String> for OneOrMany<String> {
    fn from(value: String) -> Self {
        OneOrMany::One(value)
    }
}

impl From<&String> for OneOrMany<String> {
    fn from(value: &String) -> Self {
        OneOrMany::One(value.clone())
    }
}

impl From<Vec<String>> for OneOrMany<String> {
    fn from(value: Vec<String>) -> Self {
        OneOrMany::Many(value)
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(value: Vec<&str>) -> Self {
        OneOrMany::Many(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for OneOrMany<String> {
    fn from(value: &[&str]) -> Self {
        OneOrMany::Many(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for OneOrMany<String> {
    fn from(value: [&str; N]) -> Self {
        OneOrMany::Many(value.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_prefix() {
        assert_eq!(resolve("a/b.csv", ""), "a/b.csv");
        assert_eq!(resolve("/a/b.csv", ""), "a/b.csv");
        assert_eq!(resolve("//a", ""), "a");
    }

    #[test]
    fn test_resolve_with_prefix() {
        assert_eq!(resolve("b.csv", "data"), "data/b.csv");
        assert_eq!(resolve("b.csv", "data/"), "data/b.csv");
        assert_eq!(resolve("/b.csv", "data/"), "data/b.csv");
        assert_eq!(resolve("b.csv", "/data/"), "data/b.csv");
        assert_eq!(resolve("", "data"), "data/");
    }

    #[test]
    fn test_resolve_does_not_double_prefix() {
        assert_eq!(resolve("data/b.csv", "data"), "data/b.csv");
        assert_eq!(resolve("data", "data/"), "data");
        // A sibling that merely shares the leading characters is still prefixed
        assert_eq!(resolve("database/x", "data"), "data/database/x");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let prefixes = ["", "p", "p/", "p/q", "/", "p//"];
        let keys = ["", "x", "/x", "p", "p/x", "px/y", "a/b/c.parquet", "p/q/r"];
        for prefix in prefixes {
            for key in keys {
                let once = resolve(key, prefix);
                assert_eq!(resolve(&once, prefix), once, "key={key:?} prefix={prefix:?}");
            }
        }
    }

    #[test]
    fn test_normalize_many() {
        let keys = normalize_many(&["a", "/b", "root/c"], "root");
        assert_eq!(keys, vec!["root/a", "root/b", "root/c"]);
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a/b/data.CSV").as_deref(), Some(".csv"));
        assert_eq!(extension("a.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(extension("a.d/data"), None);
        assert_eq!(extension("a/.env"), None);
        assert_eq!(extension("name."), None);
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("a/b/c.txt"), "c.txt");
        assert_eq!(basename("c.txt"), "c.txt");
        assert_eq!(basename("a/"), "");
    }

    #[test]
    fn test_one_or_many_collapse() {
        assert_eq!(OneOrMany::collapse(vec![1]), OneOrMany::One(1));
        assert_eq!(OneOrMany::collapse(vec![1, 2]), OneOrMany::Many(vec![1, 2]));
        assert_eq!(OneOrMany::<i32>::collapse(vec![]).len(), 0);
    }

    #[test]
    fn test_one_or_many_from() {
        let one: OneOrMany<String> = "k".into();
        assert_eq!(one.into_vec(), vec!["k"]);

        let many: OneOrMany<String> = ["a", "b"].into();
        assert_eq!(many.len(), 2);
        assert!(many.into_single().is_none());
    }
}
