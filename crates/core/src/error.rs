//! Fehlertypen fuer BeatSync
//!
//! Zentraler Fehler-Enum der die gemeinsamen Fehlerzustaende abdeckt.
//! Untermodule definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer BeatSync
pub type Result<T> = std::result::Result<T, BeatSyncError>;

/// Gemeinsame Fehler im BeatSync-System
#[derive(Debug, Error)]
pub enum BeatSyncError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    // --- Ressourcen ---
    #[error("Session nicht gefunden: {0}")]
    SessionNichtGefunden(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl BeatSyncError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler wiederholbar sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::Verbindung(_) | Self::Getrennt(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = BeatSyncError::SessionNichtGefunden("ABC123".into());
        assert_eq!(e.to_string(), "Session nicht gefunden: ABC123");
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(BeatSyncError::Verbindung("test".into()).ist_wiederholbar());
        assert!(!BeatSyncError::Konfiguration("test".into()).ist_wiederholbar());
    }
}
