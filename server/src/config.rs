//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use beatsync_core::{BeatSyncError, Result as BeatSyncResult};
use beatsync_relay::RelayKonfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
pub const ENV_CONFIG_PFAD: &str = "BEATSYNC_CONFIG";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Session-Einstellungen
    pub session: SessionEinstellungen,
    /// Relay-Einstellungen
    pub relay: RelayEinstellungen,
    /// Upload-Einstellungen
    pub uploads: UploadEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "BeatSync Server".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8081,
            cors_origins: vec![],
        }
    }
}

/// Session-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEinstellungen {
    /// Laenge generierter Session-IDs
    pub id_laenge: usize,
    /// Maximale Versuche bei ID-Kollisionen
    pub max_id_versuche: usize,
    /// Unbekannte Sessions beim ersten Beitritt anlegen
    pub implizite_sessions: bool,
}

impl Default for SessionEinstellungen {
    fn default() -> Self {
        let relay = RelayKonfig::default();
        Self {
            id_laenge: relay.session_id_laenge,
            max_id_versuche: relay.max_id_versuche,
            implizite_sessions: relay.implizite_sessions,
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Ausgehende Nachrichten pro Verbindung, bevor verworfen wird
    pub sende_queue_groesse: usize,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        Self {
            sende_queue_groesse: RelayKonfig::default().sende_queue_groesse,
        }
    }
}

/// Upload-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadEinstellungen {
    /// Verzeichnis fuer hochgeladene Audiodateien
    pub verzeichnis: PathBuf,
    /// Maximale Dateigroesse in Bytes
    pub max_datei_bytes: usize,
}

impl Default for UploadEinstellungen {
    fn default() -> Self {
        Self {
            verzeichnis: PathBuf::from("uploads"),
            max_datei_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Filter, z.B. "info" oder "beatsync_relay=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    /// Pfad aus `BEATSYNC_CONFIG`, sonst `config.toml`
    pub fn pfad_aus_env() -> String {
        std::env::var(ENV_CONFIG_PFAD).unwrap_or_else(|_| "config.toml".into())
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> BeatSyncResult<()> {
        if self.session.id_laenge == 0 {
            return Err(BeatSyncError::Konfiguration(
                "session.id_laenge muss groesser als 0 sein".into(),
            ));
        }
        if self.session.max_id_versuche == 0 {
            return Err(BeatSyncError::Konfiguration(
                "session.max_id_versuche muss groesser als 0 sein".into(),
            ));
        }
        if self.relay.sende_queue_groesse == 0 {
            return Err(BeatSyncError::Konfiguration(
                "relay.sende_queue_groesse muss groesser als 0 sein".into(),
            ));
        }
        if self.uploads.max_datei_bytes == 0 {
            return Err(BeatSyncError::Konfiguration(
                "uploads.max_datei_bytes muss groesser als 0 sein".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(BeatSyncError::Konfiguration(format!(
                "Unbekanntes Log-Format: {}",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Relay-Konfiguration aus den Session- und Relay-Abschnitten
    pub fn relay_konfig(&self) -> RelayKonfig {
        RelayKonfig {
            session_id_laenge: self.session.id_laenge,
            max_id_versuche: self.session.max_id_versuche,
            implizite_sessions: self.session.implizite_sessions,
            sende_queue_groesse: self.relay.sende_queue_groesse,
        }
    }

    /// Bind-Adresse fuer HTTP und WebSocket
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Bind-Adresse fuer den Observability-Server
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }
}
