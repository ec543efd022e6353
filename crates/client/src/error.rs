//! Fehlertypen fuer den Sync-Client

use beatsync_core::BeatSyncError;
use thiserror::Error;

/// Fehler die bei der Server-Verbindung auftreten koennen
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket-Verbindung fehlgeschlagen
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Nachricht konnte nicht serialisiert werden
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),

    /// Verbindung ist bereits geschlossen
    #[error("Nicht mit Server verbunden")]
    Getrennt,

    /// Server hat nicht rechtzeitig geantwortet
    #[error("Zeitueberschreitung beim Warten auf {0}")]
    Zeitueberschreitung(&'static str),

    /// Operation braucht eine beigetretene Session
    #[error("Keiner Session beigetreten")]
    KeineSession,
}

impl ClientError {
    /// Gibt `true` zurueck wenn ein erneuter Verbindungsversuch sinnvoll ist
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::Getrennt | Self::Zeitueberschreitung(_)
        )
    }
}

impl From<ClientError> for BeatSyncError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::WebSocket(e) => BeatSyncError::Verbindung(e.to_string()),
            ClientError::Getrennt => BeatSyncError::Getrennt("Client geschlossen".into()),
            andere => BeatSyncError::Intern(andere.to_string()),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
