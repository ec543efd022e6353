//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (uebersteuert die Konfigurationsdatei):
//! - `BS_LOG_LEVEL`: Filter-Direktive (z.B. `info`, `beatsync_relay=debug`)
//! - `BS_LOG_FORMAT`: Format (`text`/`json`), Standard: text

use anyhow::{anyhow, Result};
use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Filter
pub const ENV_LOG_LEVEL: &str = "BS_LOG_LEVEL";
/// Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "BS_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(anyhow!("Unbekanntes Log-Format: {andere}")),
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `BS_LOG_LEVEL` und `BS_LOG_FORMAT` haben Vorrang vor den uebergebenen
/// Werten. Ungueltige Angaben fallen auf `info` / `text` zurueck.
/// Ein zweiter Aufruf im selben Prozess ist ein Fehler.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = log_format_aus_env()
        .unwrap_or_else(|| format.to_string())
        .parse::<LogFormat>()
        .unwrap_or_default();

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow!("Logging bereits initialisiert: {e}"))
}

/// Log-Filter aus der Umgebung (falls gesetzt)
pub fn log_level_aus_env() -> Option<String> {
    std::env::var(ENV_LOG_LEVEL).ok()
}

/// Log-Format aus der Umgebung (falls gesetzt)
pub fn log_format_aus_env() -> Option<String> {
    std::env::var(ENV_LOG_FORMAT).ok()
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}
