//! Message-Dispatcher – Routet Client-Nachrichten an die richtigen Handler
//!
//! Der Dispatcher parst jede eingehende Textnachricht, bestimmt den Handler
//! und gibt eine eventuelle Direktantwort an den Absender zurueck.
//!
//! ## Fehlerbehandlung
//! Kein Fehler beendet die Verbindung:
//! - Protokollfehler (kaputtes JSON, unbekannter Typ): debug, verworfen
//! - Validierungsfehler (Pflichtfeld fehlt): warn, verworfen
//! - Zustandsfehler (keine Session, keine Empfaenger): debug, No-Op

use beatsync_core::types::ConnectionId;
use beatsync_protocol::{ClientNachricht, ServerNachricht};
use std::sync::Arc;

use crate::broadcast::ClientSender;
use crate::error::{FehlerKlasse, RelayError};
use crate::events::RelayEvent;
use crate::handlers::{relay_handler, session_handler, sync_handler};
use crate::server_state::RelayState;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
#[derive(Debug, Clone)]
pub struct DispatcherContext {
    /// Vom Server vergebenes Handle
    pub connection_id: ConnectionId,
    /// Send-Queue der Verbindung
    pub sender: ClientSender,
}

impl DispatcherContext {
    pub fn neu(sender: ClientSender) -> Self {
        Self {
            connection_id: sender.connection_id,
            sender,
        }
    }
}

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<RelayState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende Textnachricht
    ///
    /// Gibt `None` zurueck wenn keine Antwort an den Absender geht.
    pub fn dispatch(&self, text: &str, ctx: &DispatcherContext) -> Option<ServerNachricht> {
        let nachricht = match ClientNachricht::aus_json(text) {
            Ok(n) => n,
            Err(e) => {
                self.verwerfen(ctx, &e.into());
                return None;
            }
        };

        let ergebnis = match nachricht {
            ClientNachricht::Ping { t1 } => Ok(Some(sync_handler::handle_ping(t1, &self.state))),

            ClientNachricht::SessionErstellen {
                device_id,
                session_name,
            } => session_handler::handle_session_erstellen(
                device_id,
                session_name,
                &ctx.sender,
                &self.state,
            )
            .map(Some),

            ClientNachricht::Beitreten {
                session_id,
                device_id,
                nickname,
            } => session_handler::handle_beitreten(
                session_id,
                device_id,
                nickname,
                &ctx.sender,
                &self.state,
            )
            .map(|()| None),

            ClientNachricht::Relay(relay) => {
                relay_handler::handle_relay(&relay, &ctx.connection_id, &self.state).map(|_| None)
            }
        };

        match ergebnis {
            Ok(antwort) => antwort,
            Err(e) => {
                self.verwerfen(ctx, &e);
                None
            }
        }
    }

    /// Loggt einen verworfenen Vorgang gemaess seiner Fehlerklasse
    fn verwerfen(&self, ctx: &DispatcherContext, fehler: &RelayError) {
        let klasse = fehler.klasse();
        match klasse {
            FehlerKlasse::Protokoll => tracing::debug!(
                connection_id = %ctx.connection_id,
                fehler = %fehler,
                "Protokollfehler – Nachricht verworfen"
            ),
            FehlerKlasse::Validierung => tracing::warn!(
                connection_id = %ctx.connection_id,
                fehler = %fehler,
                "Ungueltige Nachricht verworfen"
            ),
            FehlerKlasse::Zustand => tracing::debug!(
                connection_id = %ctx.connection_id,
                fehler = %fehler,
                "Nachricht passt nicht zum Zustand – ignoriert"
            ),
            FehlerKlasse::Intern => tracing::error!(
                connection_id = %ctx.connection_id,
                fehler = %fehler,
                "Interner Fehler beim Verarbeiten"
            ),
        }
        self.state
            .event_senden(RelayEvent::NachrichtVerworfen { grund: klasse });
    }

    /// Raeumt nach dem Verbindungsende auf
    pub fn verbindung_geschlossen(&self, ctx: &DispatcherContext) {
        self.state.verbindung_trennen(&ctx.connection_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
