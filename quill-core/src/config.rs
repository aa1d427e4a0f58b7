//! # Quill Configuration
//!
//! A minimal, framework-agnostic configuration store based on string
//! key/value pairs. Crates read typed values from a [`QuillConfigSnapshot`]
//! and fall back to their own defaults.
//!
//! ## Setting and reading values
//! ```rust
//! use quill_core::QuillConfig;
//! let mut config = QuillConfig::new();
//!
//! config.set("drafts.max_media", "10");
//!
//! assert_eq!(config.get("drafts.max_media"), Some("10"));
//! assert_eq!(config.snapshot().get_usize("drafts.max_media"), Some(10));
//! ```
//!
//! ## Environment overrides
//! [`QuillConfig::load_env`] overlays environment variables that start with a
//! prefix, lower-casing the rest and turning `__` into `.`:
//!
//! ```bash
//! export QUILL__UPLOADS__MAX_FILE_BYTES=52428800   # uploads.max_file_bytes
//! ```

use std::{collections::HashMap, str::FromStr, sync::Arc};

#[derive(Debug, Default)]
pub struct QuillConfig {
    values: HashMap<String, String>,
}

impl QuillConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Overlay every environment variable starting with `prefix`.
    ///
    /// `QUILL__PUBLISH__LOCK_TIMEOUT_SECS` with prefix `QUILL__` becomes
    /// `publish.lock_timeout_secs`. Returns how many keys were applied.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(prefix, std::env::vars())
    }

    fn load_vars<I>(&mut self, prefix: &str, vars: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut applied = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
                applied += 1;
            }
        }
        applied
    }

    pub fn snapshot(&self) -> QuillConfigSnapshot {
        QuillConfigSnapshot::new(self.values.clone())
    }
}

/// Read-only, cheaply cloneable view of a [`QuillConfig`].
#[derive(Debug, Clone, Default)]
pub struct QuillConfigSnapshot {
    map: Arc<HashMap<String, String>>,
}

impl QuillConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map: Arc::new(map) }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// Parsed value; `None` when absent or unparseable.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.trim().parse().ok()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.parse(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.parse(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.parse(key)
    }

    /// Comma-separated list, empty entries skipped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        let list = self
            .get(key)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Some(list)
    }
}
