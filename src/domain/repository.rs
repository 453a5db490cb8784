use anyhow::Result;
use async_trait::async_trait;

/// Durable storage for the single store document.
///
/// Backends move raw bytes only; parsing, repair and de-duplication happen in
/// the record store so every backend behaves the same way.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Returns `None` when no document has been written yet.
    async fn read(&self) -> Result<Option<Vec<u8>>>;
    /// Replaces the stored document.
    async fn write(&self, bytes: &[u8]) -> Result<()>;
}
