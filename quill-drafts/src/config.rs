use std::time::Duration;

use quill_core::QuillConfigSnapshot;

const MIB: u64 = 1024 * 1024;

/// Upper bound for every `*_secs` setting (one year).
const MAX_SECS: u64 = 365 * 24 * 3600;

/// Tunables for the drafts subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftsConfig {
    /// MIME allow-list checked at initiate
    pub allowed_types: Vec<String>,
    /// Size ceiling checked at initiate and again at finalize
    pub max_file_bytes: u64,
    /// Lifetime of a signed write target and its upload session
    pub url_ttl: Duration,
    /// `MAX_MEDIA_PER_DRAFT`
    pub max_media: usize,
    /// Find-or-create attempts before giving up on a contended (owner, group)
    pub create_retries: usize,
    /// A draft stuck in `Publishing` longer than this is released by the reaper
    pub publish_lock_timeout: Duration,
    pub reaper_interval: Duration,
    /// Finished sessions are purged after this long
    pub session_retention: Duration,
}

impl Default for DraftsConfig {
    fn default() -> Self {
        Self {
            allowed_types: [
                "image/jpeg",
                "image/png",
                "image/webp",
                "image/gif",
                "video/mp4",
                "video/quicktime",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_file_bytes: 100 * MIB,
            url_ttl: Duration::from_secs(900),
            max_media: 10,
            create_retries: 3,
            publish_lock_timeout: Duration::from_secs(120),
            reaper_interval: Duration::from_secs(30),
            session_retention: Duration::from_secs(3600),
        }
    }
}

impl DraftsConfig {
    /// Read overrides from a config snapshot, falling back to defaults per key.
    pub fn from_snapshot(snapshot: &QuillConfigSnapshot) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            snapshot
                .get_u64(key)
                .map(|s| Duration::from_secs(s.min(MAX_SECS)))
                .unwrap_or(default)
        };
        let at_least_one = |d: Duration| d.max(Duration::from_secs(1));

        Self {
            allowed_types: snapshot
                .get_list("uploads.allowed_types")
                .filter(|types| !types.is_empty())
                .map(|types| types.into_iter().map(|t| t.to_ascii_lowercase()).collect())
                .unwrap_or(defaults.allowed_types),
            max_file_bytes: snapshot
                .get_u64("uploads.max_file_bytes")
                .unwrap_or(defaults.max_file_bytes),
            url_ttl: at_least_one(secs("uploads.url_ttl_secs", defaults.url_ttl)),
            max_media: snapshot
                .get_usize("drafts.max_media")
                .unwrap_or(defaults.max_media),
            create_retries: snapshot
                .get_usize("drafts.create_retries")
                .unwrap_or(defaults.create_retries)
                .max(1),
            publish_lock_timeout: secs("publish.lock_timeout_secs", defaults.publish_lock_timeout),
            reaper_interval: at_least_one(secs("reaper.interval_secs", defaults.reaper_interval)),
            session_retention: secs("reaper.session_retention_secs", defaults.session_retention),
        }
    }

    pub fn with_max_media(mut self, max_media: usize) -> Self {
        self.max_media = max_media;
        self
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    /// Case-insensitive allow-list check, parameters ignored.
    pub fn allows_type(&self, mime_type: &str) -> bool {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed_types.iter().any(|t| *t == essence)
    }
}
