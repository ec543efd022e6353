//! Ausgehende Send-Queues der verbundenen Clients
//!
//! Jede Verbindung besitzt eine begrenzte mpsc-Queue. Der Writer-Task der
//! Verbindung leert sie, das Relay reiht nur nicht-blockierend ein.
//!
//! ## Zustellung
//! - Queue voll: Nachricht wird fuer diesen Empfaenger verworfen (warn)
//! - Queue geschlossen: Empfaenger ist weg, stilles No-Op (debug)

use beatsync_core::types::ConnectionId;
use tokio::sync::mpsc;

/// Standard-Groesse der Send-Queue pro Client
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl ClientSender {
    /// Erstellt Sender und zugehoerige Empfangs-Queue
    pub fn neu(connection_id: ConnectionId, groesse: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(groesse.max(1));
        (Self { connection_id, tx }, rx)
    }

    /// Sendet eine Nachricht nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: String) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    "Send-Queue voll – Nachricht verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    "Send-Queue geschlossen (Client getrennt)"
                );
                false
            }
        }
    }

    /// Gibt `true` zurueck wenn der Empfaenger nicht mehr existiert
    pub fn ist_geschlossen(&self) -> bool {
        self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
