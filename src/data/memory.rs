use crate::domain::repository::DocumentBackend;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{instrument, trace};

/// Keeps the store document in process memory. Used by tests and for
/// throwaway runs where nothing should touch the disk.
#[derive(Clone)]
pub struct InMemoryDocumentBackend {
    storage: Arc<RwLock<Option<Vec<u8>>>>,
}

impl InMemoryDocumentBackend {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(None)),
        }
    }

    /// Starts with the given bytes already stored, valid JSON or not.
    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            storage: Arc::new(RwLock::new(Some(bytes.into()))),
        }
    }

    pub async fn contents(&self) -> Option<Vec<u8>> {
        self.storage.read().await.clone()
    }
}

impl Default for InMemoryDocumentBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentBackend for InMemoryDocumentBackend {
    #[instrument(skip(self))]
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        trace!("Acquiring read lock for document storage");
        let storage = self.storage.read().await;
        Ok(storage.clone())
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn write(&self, bytes: &[u8]) -> Result<()> {
        trace!("Acquiring write lock for document storage");
        let mut storage = self.storage.write().await;
        *storage = Some(bytes.to_vec());
        Ok(())
    }
}
