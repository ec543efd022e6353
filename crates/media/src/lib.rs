//! beatsync-media – Audio-Uploads
//!
//! Dieses Crate implementiert:
//! - UploadService: Upload mit Groessenlimit, Abruf mit Namenspruefung
//! - StorageBackend-Trait + DiskStorage-Implementierung
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use beatsync_media::{DiskStorage, UploadService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(DiskStorage::new("uploads"));
//!     let uploads = UploadService::neu(storage, 50 * 1024 * 1024);
//!     let datei = uploads.hochladen(Some("track.mp3"), b"ID3").await.unwrap();
//!     println!("{}", datei.url);
//! }
//! ```

pub mod error;
pub mod storage;
pub mod upload;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use error::{MediaError, MediaResult};
pub use storage::{DiskStorage, StorageBackend};
pub use upload::{content_type, dateiname_bereinigen, dateiname_pruefen, GespeicherteDatei, UploadService};
