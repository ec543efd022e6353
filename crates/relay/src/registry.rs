//! Session-Registry – Session-ID -> Metadaten + Mitgliedermenge
//!
//! Die Registry wird ausschliesslich unter dem Lock von `RelayState`
//! veraendert und ist deshalb selbst nicht synchronisiert. Leere Sessions
//! bleiben fuer die Lebensdauer des Prozesses erhalten.

use beatsync_core::types::{DeviceId, SessionId};
use beatsync_protocol::SessionInfo;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};

/// Zeichenvorrat fuer generierte Session-IDs
const ID_ZEICHEN: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Erzeugt eine zufaellige Session-ID aus `[A-Z0-9]`
pub fn zufalls_id(laenge: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..laenge)
        .map(|_| ID_ZEICHEN[rng.gen_range(0..ID_ZEICHEN.len())] as char)
        .collect()
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Eine Session mit ihren Mitgliedern
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub erstellt_am: DateTime<Utc>,
    mitglieder: HashSet<DeviceId>,
    /// Serialisiert die Verteilung innerhalb dieser Session
    versandsperre: Arc<Mutex<()>>,
}

impl Session {
    fn neu(id: SessionId, name: Option<String>) -> Self {
        let name = name.unwrap_or_else(|| format!("Session {}", id));
        Self {
            id,
            name,
            erstellt_am: Utc::now(),
            mitglieder: HashSet::new(),
            versandsperre: Arc::new(Mutex::new(())),
        }
    }

    /// Mitglieder der Session
    pub fn mitglieder(&self) -> &HashSet<DeviceId> {
        &self.mitglieder
    }

    pub fn ist_mitglied(&self, device_id: &DeviceId) -> bool {
        self.mitglieder.contains(device_id)
    }

    /// Aktiv solange mindestens ein Mitglied verbunden ist
    pub fn ist_aktiv(&self) -> bool {
        !self.mitglieder.is_empty()
    }

    /// Sperre fuer geordnete Verteilung (geteilt, ueberlebt den Registry-Lock)
    pub fn versandsperre(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.versandsperre)
    }

    /// Metadaten fuer Clients und HTTP
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.erstellt_am,
            device_count: self.mitglieder.len(),
            is_active: self.ist_aktiv(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Verwaltet alle Sessions des Prozesses
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    id_laenge: usize,
    max_id_versuche: usize,
    implizite_sessions: bool,
}

impl SessionRegistry {
    /// Erstellt eine leere Registry
    pub fn neu(id_laenge: usize, max_id_versuche: usize, implizite_sessions: bool) -> Self {
        Self {
            sessions: HashMap::new(),
            id_laenge,
            max_id_versuche: max_id_versuche.max(1),
            implizite_sessions,
        }
    }

    /// Legt eine Session mit zufaelliger ID an
    pub fn session_erstellen(&mut self, name: Option<String>) -> RelayResult<&mut Session> {
        let laenge = self.id_laenge;
        self.session_erstellen_mit(name, || zufalls_id(laenge))
    }

    /// Legt eine Session mit IDs aus `generator` an
    ///
    /// Bei Kollision wird neu generiert, hoechstens `max_id_versuche` mal.
    pub fn session_erstellen_mit<F>(
        &mut self,
        name: Option<String>,
        mut generator: F,
    ) -> RelayResult<&mut Session>
    where
        F: FnMut() -> String,
    {
        for versuch in 1..=self.max_id_versuche {
            let id = SessionId::neu(generator());
            if self.sessions.contains_key(&id) {
                tracing::debug!(session_id = %id, versuch, "Session-ID-Kollision");
                continue;
            }
            tracing::info!(session_id = %id, "Session erstellt");
            return Ok(self
                .sessions
                .entry(id.clone())
                .or_insert_with(|| Session::neu(id, name)));
        }
        Err(RelayError::SessionIdsErschoepft {
            versuche: self.max_id_versuche,
        })
    }

    /// Legt eine Session mit fester ID an (No-Op wenn vorhanden)
    ///
    /// Gibt `true` zurueck wenn die Session neu ist.
    #[cfg(test)]
    pub(crate) fn session_anlegen(&mut self, id: SessionId, name: Option<String>) -> bool {
        if self.sessions.contains_key(&id) {
            return false;
        }
        tracing::info!(session_id = %id, "Session angelegt");
        self.sessions.insert(id.clone(), Session::neu(id, name));
        true
    }

    /// Reine Existenzpruefung
    pub fn existiert(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Prueft ob ein Beitritt moeglich ist (existiert oder darf angelegt werden)
    pub fn beitritt_moeglich(&self, id: &SessionId) -> bool {
        self.existiert(id) || id.ist_standard() || self.implizite_sessions
    }

    /// Fuegt ein Geraet einer Session hinzu
    ///
    /// Die Standard-Session (und bei `implizite_sessions` jede Session) wird
    /// beim ersten Beitritt angelegt. Gibt die Session zurueck.
    pub fn beitreten(&mut self, id: &SessionId, device_id: DeviceId) -> RelayResult<&Session> {
        if !self.beitritt_moeglich(id) {
            return Err(RelayError::SessionUnbekannt(id.clone()));
        }
        let session = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Session::neu(id.clone(), None));
        session.mitglieder.insert(device_id);
        Ok(session)
    }

    /// Fuegt ein Geraet einer bestehenden Session hinzu (nach dem Erstellen)
    pub fn mitglied_hinzufuegen(&mut self, id: &SessionId, device_id: DeviceId) -> bool {
        match self.sessions.get_mut(id) {
            Some(s) => s.mitglieder.insert(device_id),
            None => false,
        }
    }

    /// Entfernt ein Geraet aus einer Session
    ///
    /// Gibt `true` zurueck wenn das Geraet Mitglied war.
    pub fn verlassen(&mut self, id: &SessionId, device_id: &DeviceId) -> bool {
        match self.sessions.get_mut(id) {
            Some(s) => s.mitglieder.remove(device_id),
            None => false,
        }
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn info(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.get(id).map(Session::info)
    }

    /// Iterator ueber alle Sessions
    pub fn alle(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn anzahl(&self) -> usize {
        self.sessions.len()
    }

    /// Anzahl der Sessions mit mindestens einem Mitglied
    pub fn aktive_anzahl(&self) -> usize {
        self.sessions.values().filter(|s| s.ist_aktiv()).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
