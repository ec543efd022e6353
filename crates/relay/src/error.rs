//! Fehlertypen fuer das Relay
//!
//! Kein Fehler ist fuer den Relay-Prozess fatal; jeder Fehler betrifft nur
//! die eine Nachricht, die ihn ausgeloest hat.

use beatsync_core::types::{ConnectionId, SessionId};
use beatsync_protocol::{FehlerArt, NachrichtenFehler};
use thiserror::Error;

/// Grobe Einordnung eines Relay-Fehlers (bestimmt Log-Level und Metrik-Label)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FehlerKlasse {
    /// Kaputtes JSON, unbekannter Typ – still verworfen
    Protokoll,
    /// Pflichtfeld fehlt – geloggt und verworfen
    Validierung,
    /// Passt nicht zum aktuellen Zustand – No-Op
    Zustand,
    /// Sollte im Normalbetrieb nicht auftreten
    Intern,
}

impl FehlerKlasse {
    /// Label fuer Metriken und Logs
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Protokoll => "protocol",
            Self::Validierung => "validation",
            Self::Zustand => "state",
            Self::Intern => "internal",
        }
    }
}

/// Fehlertyp fuer das Relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Ungueltige Nachricht (Protokoll- oder Validierungsfehler)
    #[error(transparent)]
    Nachricht(#[from] NachrichtenFehler),

    /// Explizite Session existiert nicht
    #[error("Session unbekannt: {0}")]
    SessionUnbekannt(SessionId),

    /// Verbindung ist keiner Session beigetreten
    #[error("Verbindung ohne Session: {0}")]
    KeineSession(ConnectionId),

    /// Absender ist allein in seiner Session
    #[error("Keine Empfaenger in Session {0}")]
    KeineEmpfaenger(SessionId),

    /// Kein freier Session-Bezeichner gefunden
    #[error("Keine freie Session-ID nach {versuche} Versuchen")]
    SessionIdsErschoepft { versuche: usize },

    /// Serialisierung einer ausgehenden Nachricht fehlgeschlagen
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),
}

impl RelayError {
    /// Ordnet den Fehler einer Klasse zu
    pub fn klasse(&self) -> FehlerKlasse {
        match self {
            Self::Nachricht(e) => match e.art() {
                FehlerArt::Protokoll => FehlerKlasse::Protokoll,
                FehlerArt::Validierung => FehlerKlasse::Validierung,
            },
            Self::SessionUnbekannt(_) | Self::KeineSession(_) | Self::KeineEmpfaenger(_) => {
                FehlerKlasse::Zustand
            }
            Self::SessionIdsErschoepft { .. } | Self::Serialisierung(_) => FehlerKlasse::Intern,
        }
    }
}

/// Result-Typ fuer das Relay
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn klassen_zuordnung() {
        let e: RelayError = NachrichtenFehler::TypFehlt.into();
        assert_eq!(e.klasse(), FehlerKlasse::Protokoll);

        let e: RelayError = NachrichtenFehler::FeldFehlt("deviceId").into();
        assert_eq!(e.klasse(), FehlerKlasse::Validierung);

        let e = RelayError::SessionUnbekannt(SessionId::neu("NOPE00"));
        assert_eq!(e.klasse(), FehlerKlasse::Zustand);

        let e = RelayError::SessionIdsErschoepft { versuche: 3 };
        assert_eq!(e.klasse(), FehlerKlasse::Intern);
        assert!(e.to_string().contains('3'));
    }
}
