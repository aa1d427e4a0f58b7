use std::sync::Arc;

use quill_blob::{BlobKeyStrategy, SignedUrlBlobStore};

use crate::{
    DraftBackend, DraftStore, DraftsConfig, MediaLedger, PublishCoordinator, SessionReaper,
    UploadCoordinator,
};

/// One handle over every drafts service, sharing a backend and blob store
#[derive(Clone)]
pub struct DraftsAdapter {
    backend: Arc<dyn DraftBackend>,
    config: Arc<DraftsConfig>,
    pub drafts: DraftStore,
    pub uploads: UploadCoordinator,
    pub ledger: MediaLedger,
    pub publisher: PublishCoordinator,
}

impl DraftsAdapter {
    pub fn new<B, S>(backend: B, blobs: S, config: DraftsConfig) -> Self
    where
        B: DraftBackend + 'static,
        S: SignedUrlBlobStore + 'static,
    {
        Self::from_shared(Arc::new(backend), Arc::new(blobs), config)
    }

    pub fn from_shared(
        backend: Arc<dyn DraftBackend>,
        blobs: Arc<dyn SignedUrlBlobStore>,
        config: DraftsConfig,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            drafts: DraftStore::new(backend.clone(), blobs.clone(), config.create_retries),
            uploads: UploadCoordinator::new(backend.clone(), blobs.clone(), config.clone()),
            ledger: MediaLedger::new(backend.clone(), blobs),
            publisher: PublishCoordinator::new(backend.clone()),
            backend,
            config,
        }
    }

    pub fn with_key_strategy<K: BlobKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.uploads = self.uploads.with_key_strategy(keys);
        self
    }

    /// A reaper over the same backend, configured from `config()`
    pub fn reaper(&self) -> SessionReaper {
        SessionReaper::new(self.backend.clone(), &self.config)
    }

    pub fn config(&self) -> &DraftsConfig {
        &self.config
    }
}
