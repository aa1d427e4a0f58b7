use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{DraftBackend, DraftResult, DraftsConfig};

/// What one reaper pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub expired_sessions: usize,
    pub purged_sessions: usize,
    pub released_drafts: usize,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.expired_sessions == 0 && self.purged_sessions == 0 && self.released_drafts == 0
    }
}

/// Passive garbage collection for upload sessions and stuck publish locks
pub struct SessionReaper {
    backend: Arc<dyn DraftBackend>,
    interval: Duration,
    session_retention: Duration,
    publish_lock_timeout: Duration,
}

impl SessionReaper {
    pub fn new(backend: Arc<dyn DraftBackend>, config: &DraftsConfig) -> Self {
        Self {
            backend,
            interval: config.reaper_interval,
            session_retention: config.session_retention,
            publish_lock_timeout: config.publish_lock_timeout,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_session_retention(mut self, retention: Duration) -> Self {
        self.session_retention = retention;
        self
    }

    /// Tick until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = interval(self.interval.max(Duration::from_millis(1)));
        info!("Starting session reaper with interval: {:?}", self.interval);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Session reaper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.is_empty() => debug!("Nothing to reap"),
                        Ok(report) => info!(?report, "Reaper pass finished"),
                        Err(e) => warn!("Error during reaper pass: {}", e),
                    }
                }
            }
        }
    }

    /// Run one reaper cycle
    pub async fn run_once(&self) -> DraftResult<ReapReport> {
        let now = Utc::now();
        let mut report = ReapReport::default();

        for upload_id in self.backend.expired_sessions(now).await? {
            if let Some(record) = self
                .backend
                .fail_upload(&upload_id, "upload session expired")
                .await?
            {
                debug!(upload_id = %upload_id, media_id = %record.id, "media slot failed on expiry");
                report.expired_sessions += 1;
            }
        }

        let purge_before = cutoff(now, self.session_retention);
        report.purged_sessions = self.backend.purge_sessions(purge_before).await?;

        for draft_id in self
            .backend
            .stale_publishing(cutoff(now, self.publish_lock_timeout))
            .await?
        {
            if self.backend.release_publish(&draft_id).await? {
                warn!(draft_id = %draft_id, "released stale publish lock");
                report.released_drafts += 1;
            }
        }

        Ok(report)
    }
}

/// `now - age`, saturating at the earliest representable instant
fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
