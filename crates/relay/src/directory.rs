//! Verbindungsverzeichnis – DeviceId -> Verbindung, ConnectionId -> DeviceId
//!
//! Wie die Registry wird das Verzeichnis nur unter dem Lock von
//! `RelayState` veraendert. Der Rueckwaerts-Index erlaubt das Aufraeumen
//! beim Verbindungsende in O(1).

use beatsync_core::types::{ConnectionId, DeviceId, SessionId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::broadcast::ClientSender;

/// Eintrag eines registrierten Geraets
#[derive(Debug, Clone)]
pub struct Verbindung {
    pub device_id: DeviceId,
    pub connection_id: ConnectionId,
    pub session_id: SessionId,
    pub sender: ClientSender,
    pub nickname: Option<String>,
    pub verbunden_seit: DateTime<Utc>,
}

impl Verbindung {
    pub fn neu(
        device_id: DeviceId,
        session_id: SessionId,
        sender: ClientSender,
        nickname: Option<String>,
    ) -> Self {
        Self {
            device_id,
            connection_id: sender.connection_id,
            session_id,
            sender,
            nickname,
            verbunden_seit: Utc::now(),
        }
    }

    /// Gueltig solange die Send-Queue offen ist
    pub fn ist_gueltig(&self) -> bool {
        !self.sender.ist_geschlossen()
    }
}

/// Verzeichnis aller registrierten Geraete
#[derive(Debug, Default)]
pub struct ConnectionDirectory {
    geraete: HashMap<DeviceId, Verbindung>,
    handles: HashMap<ConnectionId, DeviceId>,
}

impl ConnectionDirectory {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Verbindung (letzter Schreiber gewinnt)
    ///
    /// Gibt den verdraengten Eintrag desselben Geraets zurueck. Dessen
    /// Handle verliert seinen Index-Eintrag.
    pub fn registrieren(&mut self, verbindung: Verbindung) -> Option<Verbindung> {
        let vorher = self
            .geraete
            .insert(verbindung.device_id.clone(), verbindung.clone());
        if let Some(ref alt) = vorher {
            if alt.connection_id != verbindung.connection_id {
                self.handles.remove(&alt.connection_id);
            }
        }
        self.handles
            .insert(verbindung.connection_id, verbindung.device_id);
        vorher
    }

    /// Entfernt den Eintrag eines Handles (idempotent)
    pub fn abmelden(&mut self, connection_id: &ConnectionId) -> Option<Verbindung> {
        let device_id = self.handles.remove(connection_id)?;
        match self.geraete.get(&device_id) {
            Some(v) if v.connection_id == *connection_id => self.geraete.remove(&device_id),
            _ => None,
        }
    }

    pub fn finden(&self, device_id: &DeviceId) -> Option<&Verbindung> {
        self.geraete.get(device_id)
    }

    /// Rueckwaerts-Suche ueber das Handle
    pub fn finden_per_handle(&self, connection_id: &ConnectionId) -> Option<&Verbindung> {
        self.handles
            .get(connection_id)
            .and_then(|d| self.geraete.get(d))
    }

    pub fn device_per_handle(&self, connection_id: &ConnectionId) -> Option<&DeviceId> {
        self.handles.get(connection_id)
    }

    /// Iterator ueber alle Eintraege
    pub fn alle(&self) -> impl Iterator<Item = &Verbindung> {
        self.geraete.values()
    }

    /// Anzahl der Handles im Rueckwaerts-Index
    pub fn handle_anzahl(&self) -> usize {
        self.handles.len()
    }

    pub fn anzahl(&self) -> usize {
        self.geraete.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
