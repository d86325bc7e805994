//! Secret values and log masking

use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Replacement text for secret values in any displayed output
pub const MASK: &str = "***";

/// Secret values available to a run
///
/// Values are read once at start-up. `Debug` prints names only.
#[derive(Clone, Default)]
pub struct SecretStore {
    values: BTreeMap<String, String>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the declared secrets from the process environment
    ///
    /// A declared secret with no value resolves to the empty string.
    pub fn from_process_env(names: &[String]) -> Self {
        let mut store = Self::new();
        for name in names {
            match std::env::var(name) {
                Ok(value) => store.insert(name.clone(), value),
                Err(_) => {
                    warn!(
                        "Secret '{}' is declared but not set; it will expand to an empty string",
                        name
                    );
                    store.insert(name.clone(), String::new());
                }
            }
        }
        store
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every occurrence of a secret value with [`MASK`]
    pub fn mask(&self, text: &str) -> String {
        let mut secrets: Vec<&str> = self
            .values
            .values()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .collect();
        // Longest first so a secret containing another is masked whole
        secrets.sort_by_key(|v| std::cmp::Reverse(v.len()));

        let mut masked = text.to_string();
        for secret in secrets {
            if masked.contains(secret) {
                masked = masked.replace(secret, MASK);
            }
        }
        masked
    }

    /// Whether `value` is exactly one of the secret values
    pub fn is_secret_value(&self, value: &str) -> bool {
        !value.is_empty() && self.values.values().any(|v| v == value)
    }
}

impl fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStore")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}
