//! Gemeinsamer Relay-Zustand
//!
//! Registry und Verzeichnis liegen zusammen hinter einem einzigen
//! `parking_lot::Mutex`, damit jede Mutation die Konsistenz beider Seiten
//! in einem Schritt herstellt. Kritische Abschnitte warten nie und machen
//! keine I/O.
//!
//! ## Lock-Reihenfolge
//! Session-Versandsperre vor globalem Lock. Unter dem globalen Lock wird
//! nie eine Versandsperre angefordert.

use beatsync_core::types::{ConnectionId, DeviceId, SessionId};
use beatsync_protocol::{MonotoneUhr, RelayNachricht, SessionInfo};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::broadcast::{ClientSender, SEND_QUEUE_GROESSE};
use crate::directory::{ConnectionDirectory, Verbindung};
use crate::error::{RelayError, RelayResult};
use crate::events::{RelayEvent, EVENT_KAPAZITAET};
use crate::registry::SessionRegistry;

/// Konfiguration fuer das Relay
#[derive(Debug, Clone)]
pub struct RelayKonfig {
    /// Laenge generierter Session-IDs
    pub session_id_laenge: usize,
    /// Maximale Versuche bei ID-Kollisionen
    pub max_id_versuche: usize,
    /// Unbekannte Sessions beim ersten Beitritt anlegen
    pub implizite_sessions: bool,
    /// Groesse der Send-Queue pro Verbindung
    pub sende_queue_groesse: usize,
}

impl Default for RelayKonfig {
    fn default() -> Self {
        Self {
            session_id_laenge: 6,
            max_id_versuche: 64,
            implizite_sessions: false,
            sende_queue_groesse: SEND_QUEUE_GROESSE,
        }
    }
}

/// Ergebnis einer Verteilung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zustellung {
    pub session_id: SessionId,
    /// Anzahl der Empfaenger (alle Mitglieder ausser dem Absender)
    pub empfaenger: usize,
    /// Davon erfolgreich eingereiht
    pub zugestellt: usize,
}

/// Momentaufnahme fuer Health und Metriken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStatistik {
    pub verbundene_geraete: usize,
    pub sessions: usize,
    pub aktive_sessions: usize,
}

struct RelayInner {
    sessions: SessionRegistry,
    verbindungen: ConnectionDirectory,
}

impl RelayInner {
    /// Entfernt ein Geraet aus Session und Verzeichnis
    fn handle_entfernen(&mut self, connection_id: &ConnectionId) -> Option<Verbindung> {
        let verbindung = self.verbindungen.abmelden(connection_id)?;
        self.sessions
            .verlassen(&verbindung.session_id, &verbindung.device_id);
        Some(verbindung)
    }

    /// Bereinigt alte Zuordnungen vor einer Registrierung
    ///
    /// - Handle unter anderem Geraet: altes Geraet abmelden
    /// - Geraet bereits registriert: aus der alten Session entfernen
    fn vorherige_loesen(
        &mut self,
        connection_id: &ConnectionId,
        device_id: &DeviceId,
    ) -> Vec<Verbindung> {
        let mut entfernt = Vec::new();
        let anderes_geraet = self
            .verbindungen
            .device_per_handle(connection_id)
            .filter(|d| *d != device_id)
            .is_some();
        if anderes_geraet {
            entfernt.extend(self.handle_entfernen(connection_id));
        }
        if let Some(alt) = self.verbindungen.finden(device_id) {
            let alte_session = alt.session_id.clone();
            self.sessions.verlassen(&alte_session, device_id);
        }
        entfernt
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Relay-Konfiguration
    pub config: RelayKonfig,
    inner: Mutex<RelayInner>,
    /// Monotone Serveruhr fuer Pong und Relay-Zeitstempel
    uhr: MonotoneUhr,
    events: broadcast::Sender<RelayEvent>,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayKonfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_KAPAZITAET);
        let sessions = SessionRegistry::neu(
            config.session_id_laenge,
            config.max_id_versuche,
            config.implizite_sessions,
        );
        Arc::new(Self {
            config,
            inner: Mutex::new(RelayInner {
                sessions,
                verbindungen: ConnectionDirectory::neu(),
            }),
            uhr: MonotoneUhr::starten(),
            events,
        })
    }

    /// Aktuelle Serverzeit in ms seit Relay-Start
    pub fn server_zeit_ms(&self) -> f64 {
        self.uhr.jetzt_ms()
    }

    /// Erstellt die Send-Queue fuer eine neue Verbindung
    pub fn sender_erstellen(&self) -> (ClientSender, mpsc::Receiver<String>) {
        ClientSender::neu(ConnectionId::new(), self.config.sende_queue_groesse)
    }

    /// Abonniert die Relay-Events
    pub fn events_abonnieren(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_senden(&self, event: RelayEvent) {
        // Ohne Abonnenten schlaegt send fehl
        let _ = self.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Legt eine Session ohne Mitglieder an
    #[cfg(test)]
    pub(crate) fn session_anlegen(&self, id: SessionId, name: Option<String>) -> bool {
        let neu = self.inner.lock().sessions.session_anlegen(id.clone(), name);
        if neu {
            self.event_senden(RelayEvent::SessionErstellt { session_id: id });
        }
        neu
    }

    /// Erstellt eine Session und registriert den Absender als erstes Mitglied
    pub fn session_erstellen(
        &self,
        sender: &ClientSender,
        device_id: DeviceId,
        name: Option<String>,
    ) -> RelayResult<SessionInfo> {
        let (info, entfernt) = {
            let mut inner = self.inner.lock();
            let session_id = inner.sessions.session_erstellen(name)?.id.clone();
            let entfernt = inner.vorherige_loesen(&sender.connection_id, &device_id);
            inner
                .sessions
                .mitglied_hinzufuegen(&session_id, device_id.clone());
            inner.verbindungen.registrieren(Verbindung::neu(
                device_id.clone(),
                session_id.clone(),
                sender.clone(),
                None,
            ));
            let info = inner
                .sessions
                .info(&session_id)
                .ok_or_else(|| RelayError::SessionUnbekannt(session_id.clone()))?;
            (info, entfernt)
        };

        self.getrennte_melden(entfernt);
        self.event_senden(RelayEvent::SessionErstellt {
            session_id: info.session_id.clone(),
        });
        self.event_senden(RelayEvent::GeraetBeigetreten {
            device_id,
            session_id: info.session_id.clone(),
        });
        Ok(info)
    }

    /// Registriert ein Geraet und tritt einer Session bei
    pub fn beitreten(
        &self,
        sender: &ClientSender,
        device_id: DeviceId,
        session_id: SessionId,
        nickname: Option<String>,
    ) -> RelayResult<()> {
        let (neu_angelegt, entfernt) = {
            let mut inner = self.inner.lock();
            if !inner.sessions.beitritt_moeglich(&session_id) {
                return Err(RelayError::SessionUnbekannt(session_id));
            }
            let neu_angelegt = !inner.sessions.existiert(&session_id);
            let entfernt = inner.vorherige_loesen(&sender.connection_id, &device_id);
            inner.sessions.beitreten(&session_id, device_id.clone())?;
            inner.verbindungen.registrieren(Verbindung::neu(
                device_id.clone(),
                session_id.clone(),
                sender.clone(),
                nickname,
            ));
            (neu_angelegt, entfernt)
        };

        tracing::info!(device = %device_id, session_id = %session_id, "Geraet beigetreten");
        self.getrennte_melden(entfernt);
        if neu_angelegt {
            self.event_senden(RelayEvent::SessionErstellt {
                session_id: session_id.clone(),
            });
        }
        self.event_senden(RelayEvent::GeraetBeigetreten {
            device_id,
            session_id,
        });
        Ok(())
    }

    /// Raeumt eine geschlossene Verbindung auf (idempotent)
    ///
    /// Session-Mitgliedschaft und Verzeichniseintrag verschwinden in einem
    /// kritischen Abschnitt.
    pub fn verbindung_trennen(&self, connection_id: &ConnectionId) -> Option<Verbindung> {
        let verbindung = self.inner.lock().handle_entfernen(connection_id);
        match verbindung {
            Some(v) => {
                tracing::info!(
                    device = %v.device_id,
                    session_id = %v.session_id,
                    "Geraet getrennt"
                );
                self.getrennte_melden(vec![v.clone()]);
                Some(v)
            }
            None => {
                tracing::debug!(connection_id = %connection_id, "Trennen ohne Registrierung");
                None
            }
        }
    }

    fn getrennte_melden(&self, entfernt: Vec<Verbindung>) {
        for v in entfernt {
            self.event_senden(RelayEvent::GeraetGetrennt {
                device_id: v.device_id,
                session_id: v.session_id,
            });
        }
    }

    pub fn session_existiert(&self, id: &SessionId) -> bool {
        self.inner.lock().sessions.existiert(id)
    }

    pub fn session_info(&self, id: &SessionId) -> Option<SessionInfo> {
        self.inner.lock().sessions.info(id)
    }

    /// Verzeichniseintrag eines Handles
    pub fn verbindung(&self, connection_id: &ConnectionId) -> Option<Verbindung> {
        self.inner
            .lock()
            .verbindungen
            .finden_per_handle(connection_id)
            .cloned()
    }

    // -----------------------------------------------------------------------
    // Verteilung
    // -----------------------------------------------------------------------

    /// Verteilt eine Relay-Nachricht an alle anderen Mitglieder der Session
    ///
    /// Die Session wird ueber das Handle bestimmt, nie ueber eine vom
    /// Client gelieferte `sessionId`. Zeitstempel und Einreihen geschehen
    /// unter der Versandsperre der Session, damit alle Mitglieder dieselbe
    /// Reihenfolge sehen.
    pub fn verteilen(
        &self,
        connection_id: &ConnectionId,
        nachricht: &RelayNachricht,
    ) -> RelayResult<Zustellung> {
        let (session_id, sperre) = {
            let inner = self.inner.lock();
            let session = inner
                .verbindungen
                .finden_per_handle(connection_id)
                .and_then(|v| inner.sessions.session(&v.session_id))
                .ok_or(RelayError::KeineSession(*connection_id))?;
            (session.id.clone(), session.versandsperre())
        };

        let _geordnet = sperre.lock();

        let empfaenger: Vec<ClientSender> = {
            let inner = self.inner.lock();
            // Absender kann zwischenzeitlich gewechselt haben
            let absender = match inner.verbindungen.finden_per_handle(connection_id) {
                Some(v) if v.session_id == session_id => v.device_id.clone(),
                _ => return Err(RelayError::KeineSession(*connection_id)),
            };
            let session = inner
                .sessions
                .session(&session_id)
                .ok_or_else(|| RelayError::SessionUnbekannt(session_id.clone()))?;
            session
                .mitglieder()
                .iter()
                .filter(|d| **d != absender)
                .filter_map(|d| inner.verbindungen.finden(d))
                .map(|v| v.sender.clone())
                .collect()
        };

        if empfaenger.is_empty() {
            return Err(RelayError::KeineEmpfaenger(session_id));
        }

        let text = nachricht.mit_zeitstempel(self.server_zeit_ms()).to_json()?;
        let zugestellt = empfaenger
            .iter()
            .filter(|s| s.senden(text.clone()))
            .count();

        tracing::debug!(
            session_id = %session_id,
            art = %nachricht.art(),
            empfaenger = empfaenger.len(),
            zugestellt,
            "Nachricht verteilt"
        );

        let zustellung = Zustellung {
            session_id,
            empfaenger: empfaenger.len(),
            zugestellt,
        };
        self.event_senden(RelayEvent::NachrichtVerteilt {
            session_id: zustellung.session_id.clone(),
            art: nachricht.art(),
            empfaenger: zustellung.empfaenger,
            zugestellt,
        });
        Ok(zustellung)
    }

    // -----------------------------------------------------------------------
    // Diagnose
    // -----------------------------------------------------------------------

    pub fn statistik(&self) -> RelayStatistik {
        let inner = self.inner.lock();
        RelayStatistik {
            verbundene_geraete: inner.verbindungen.anzahl(),
            sessions: inner.sessions.anzahl(),
            aktive_sessions: inner.sessions.aktive_anzahl(),
        }
    }

    /// Prueft die referenzielle Konsistenz von Registry und Verzeichnis
    pub fn konsistenz_pruefen(&self) -> Result<(), String> {
        let inner = self.inner.lock();

        for session in inner.sessions.alle() {
            for device in session.mitglieder() {
                match inner.verbindungen.finden(device) {
                    Some(v) if v.session_id == session.id => {}
                    Some(v) => {
                        return Err(format!(
                            "{} ist Mitglied von {}, Eintrag nennt {}",
                            device, session.id, v.session_id
                        ))
                    }
                    None => {
                        return Err(format!(
                            "{} ist Mitglied von {} ohne Verzeichniseintrag",
                            device, session.id
                        ))
                    }
                }
            }
        }

        for v in inner.verbindungen.alle() {
            let ist_mitglied = inner
                .sessions
                .session(&v.session_id)
                .map(|s| s.ist_mitglied(&v.device_id))
                .unwrap_or(false);
            if !ist_mitglied {
                return Err(format!(
                    "{} nennt {}, ist dort aber kein Mitglied",
                    v.device_id, v.session_id
                ));
            }
            if inner.verbindungen.device_per_handle(&v.connection_id) != Some(&v.device_id) {
                return Err(format!("{} fehlt im Handle-Index", v.device_id));
            }
        }

        if inner.verbindungen.handle_anzahl() != inner.verbindungen.anzahl() {
            return Err("Handle-Index und Verzeichnis unterschiedlich gross".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
