//! UploadService – Audio-Upload und Auslieferung
//!
//! Gespeicherte Dateien heissen `<millis>-<bereinigter Originalname>` und
//! werden ueber `/audio?file=<name>` ausgeliefert.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};
use crate::storage::StorageBackend;

/// Ersatzname fuer Uploads ohne brauchbaren Dateinamen
const ERSATZ_NAME: &str = "upload";

/// Antwort auf einen erfolgreichen Upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GespeicherteDatei {
    pub filename: String,
    pub url: String,
}

/// Verwaltet Upload und Abruf von Audiodateien
pub struct UploadService<S: StorageBackend> {
    storage: Arc<S>,
    max_bytes: usize,
}

impl<S: StorageBackend> UploadService<S> {
    /// Neuen UploadService erstellen
    pub fn neu(storage: Arc<S>, max_bytes: usize) -> Arc<Self> {
        Arc::new(Self { storage, max_bytes })
    }

    /// Maximale Dateigroesse in Bytes
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Speichert eine hochgeladene Datei
    pub async fn hochladen(
        &self,
        original_name: Option<&str>,
        data: &[u8],
    ) -> MediaResult<GespeicherteDatei> {
        if data.is_empty() {
            return Err(MediaError::LeereDatei);
        }
        if data.len() > self.max_bytes {
            return Err(MediaError::DateiZuGross {
                size: data.len(),
                max: self.max_bytes,
            });
        }

        let filename = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            dateiname_bereinigen(original_name.unwrap_or(ERSATZ_NAME))
        );
        self.storage.store(&filename, data).await?;

        tracing::info!(filename = %filename, bytes = data.len(), "Audio hochgeladen");

        Ok(GespeicherteDatei {
            url: format!("/audio?file={}", filename),
            filename,
        })
    }

    /// Laedt eine gespeicherte Datei
    pub async fn laden(&self, filename: &str) -> MediaResult<Vec<u8>> {
        dateiname_pruefen(filename)?;
        self.storage.retrieve(filename).await
    }
}

/// Lehnt Namen ab, die aus dem Upload-Verzeichnis herausfuehren koennten
pub fn dateiname_pruefen(name: &str) -> MediaResult<()> {
    let ungueltig = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.contains('\0');
    if ungueltig {
        return Err(MediaError::UngueltigerName(name.to_string()));
    }
    Ok(())
}

/// Reduziert einen Client-Dateinamen auf `[A-Za-z0-9._-]`
///
/// Verzeichnisanteile werden entfernt, fuehrende Punkte abgeschnitten.
pub fn dateiname_bereinigen(name: &str) -> String {
    let basis = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let bereinigt: String = basis
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let bereinigt = bereinigt.trim_start_matches('.').replace("..", "_");
    if bereinigt.is_empty() {
        ERSATZ_NAME.to_string()
    } else {
        bereinigt
    }
}

/// Content-Type anhand der Dateiendung
pub fn content_type(filename: &str) -> &'static str {
    let endung = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match endung.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "m4a" | "mp4" | "aac" => "audio/mp4",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}
