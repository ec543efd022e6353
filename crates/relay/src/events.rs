//! Relay-Events fuer Metriken und Beobachter
//!
//! Der `RelayState` veroeffentlicht Events ueber einen
//! `tokio::sync::broadcast`-Channel. Fehlende Abonnenten sind kein Fehler.

use beatsync_core::types::{DeviceId, SessionId};
use beatsync_protocol::RelayArt;

use crate::error::FehlerKlasse;

/// Event-Kapazitaet des Broadcast-Channels
pub const EVENT_KAPAZITAET: usize = 256;

/// Zustandsaenderungen und Verteilvorgaenge im Relay
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// Geraet ist einer Session beigetreten
    GeraetBeigetreten {
        device_id: DeviceId,
        session_id: SessionId,
    },
    /// Geraet wurde beim Verbindungsende entfernt
    GeraetGetrennt {
        device_id: DeviceId,
        session_id: SessionId,
    },
    /// Neue Session wurde erstellt
    SessionErstellt { session_id: SessionId },
    /// Relay-Nachricht wurde verteilt
    NachrichtVerteilt {
        session_id: SessionId,
        art: RelayArt,
        empfaenger: usize,
        zugestellt: usize,
    },
    /// Eingehende Nachricht wurde verworfen
    NachrichtVerworfen { grund: FehlerKlasse },
}
