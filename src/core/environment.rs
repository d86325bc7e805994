//! Run-wide environment shared by every step

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Error raised while reading an environment export file
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("line {line}: expected KEY=VALUE, got '{content}'")]
    MissingSeparator { line: usize, content: String },

    #[error("line {line}: invalid variable name '{name}'")]
    InvalidName { line: usize, name: String },
}

/// Accumulating variable set for a pipeline run
///
/// Variables are only ever added or overwritten; nothing removes a key
/// once it has been set, so every later step sees at least what earlier
/// steps saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, returning the value it replaced
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(key.into(), value.into())
    }

    /// Get a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Merge variables in order; later pairs win on key collision
    pub fn merge<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.set(key, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Snapshot of the variables for handing to a subprocess
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.vars.clone()
    }

    /// Parse the contents of an export file written by a command
    ///
    /// Each non-blank line that does not start with `#` must be `KEY=VALUE`.
    /// The value is taken verbatim after the first `=`.
    pub fn parse_exports(content: &str) -> Result<Vec<(String, String)>, ExportError> {
        let mut exports = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }

            let (name, value) = line.split_once('=').ok_or_else(|| ExportError::MissingSeparator {
                line: idx + 1,
                content: line.to_string(),
            })?;

            let name = name.trim();
            if !is_valid_name(name) {
                return Err(ExportError::InvalidName {
                    line: idx + 1,
                    name: name.to_string(),
                });
            }

            exports.push((name.to_string(), value.to_string()));
        }

        Ok(exports)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Environment::new();
        env.merge(iter);
        env
    }
}

/// Whether `name` is usable as an environment variable name
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
