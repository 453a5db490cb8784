use crate::domain::repository::DocumentBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

/// Stores the document as a single JSON file.
///
/// Writes land in a sibling temp file first and are renamed over the target,
/// so readers only ever see a complete document.
#[derive(Clone, Debug)]
pub struct FileDocumentBackend {
    file_path: PathBuf,
}

impl FileDocumentBackend {
    /// Creates the parent directory if needed. The file itself is created
    /// lazily by the first write.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        Ok(Self { file_path })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn temp_path(&self) -> PathBuf {
        self.file_path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl DocumentBackend for FileDocumentBackend {
    #[instrument(skip(self), fields(path = %self.file_path.display()))]
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.file_path).await {
            Ok(bytes) => {
                trace!(len = bytes.len(), "Read store document");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Store document does not exist yet");
                Ok(None)
            }
            Err(e) => Err(e)
                .with_context(|| format!("cannot read {}", self.file_path.display())),
        }
    }

    #[instrument(skip(self, bytes), fields(path = %self.file_path.display(), len = bytes.len()))]
    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let temp_path = self.temp_path();
        fs::write(&temp_path, bytes)
            .await
            .with_context(|| format!("cannot write {}", temp_path.display()))?;
        if let Err(e) = fs::rename(&temp_path, &self.file_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e)
                .with_context(|| format!("cannot replace {}", self.file_path.display()));
        }
        trace!("Store document replaced");
        Ok(())
    }
}
