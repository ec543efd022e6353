//! Storage-Backend fuer Audio-Uploads
//!
//! Das `StorageBackend`-Trait abstrahiert den konkreten Speicher. Die
//! Futures sind `Send`, damit Axum-Handler sie direkt awaiten koennen.

use std::future::Future;
use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};

/// Abstraktes Speicher-Backend fuer Dateien
pub trait StorageBackend: Send + Sync {
    /// Datei unter dem angegebenen Namen speichern
    fn store(&self, name: &str, data: &[u8]) -> impl Future<Output = MediaResult<()>> + Send;

    /// Datei laden
    fn retrieve(&self, name: &str) -> impl Future<Output = MediaResult<Vec<u8>>> + Send;
}

/// Disk-basiertes Storage-Backend
///
/// Speichert Dateien flach unter `base_dir/<name>`.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    base_dir: PathBuf,
}

impl DiskStorage {
    /// Neues DiskStorage mit dem angegebenen Basisverzeichnis erstellen
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }
}

impl StorageBackend for DiskStorage {
    async fn store(&self, name: &str, data: &[u8]) -> MediaResult<()> {
        let full = self.full_path(name);
        tokio::fs::create_dir_all(&self.base_dir).await?;
        tokio::fs::write(&full, data).await?;
        tracing::debug!(path = %full.display(), bytes = data.len(), "Datei gespeichert");
        Ok(())
    }

    async fn retrieve(&self, name: &str) -> MediaResult<Vec<u8>> {
        let full = self.full_path(name);
        match tokio::fs::read(&full).await {
            Ok(data) => {
                tracing::debug!(path = %full.display(), bytes = data.len(), "Datei gelesen");
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::DateiNichtGefunden(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
