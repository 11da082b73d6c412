//! Key/value text sources.
//!
//! The private routing data, the topology and the peer configuration all use
//! the same line format:
//!
//! ```text
//! # comment
//! nitems = 2
//! 1_customers: 5,7
//! ```
//!
//! Keys and values are trimmed, `#` and `!` start comment lines, the first `=`
//! or `:` separates key from value, and a later duplicate overrides an earlier
//! one.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

#[cfg(feature = "std")]
use std::path::Path;

#[cfg(feature = "std")]
use super::DatasetError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut props = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            match line.find(|c: char| c == '=' || c == ':') {
                Some(pos) => props.insert(line[..pos].trim(), line[pos + 1..].trim()),
                None => props.insert(line, ""),
            }
        }
        props
    }

    /// Reads and parses a file. Any I/O failure is reported as unreadable.
    #[cfg(feature = "std")]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DatasetError::Unreadable(alloc::format!("{}: {}", path.display(), e)))?;
        Ok(Self::parse(&text))
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value for `key`, or `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
