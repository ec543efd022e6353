//! Client-seitige WebSocket-Verbindung zum BeatSync-Relay
//!
//! Drei Hintergrund-Tasks pro Verbindung:
//! - Schreiber: Send-Queue -> WebSocket
//! - Leser: WebSocket -> Pong-Verarbeitung, Antworten, Relay-Nachrichten
//!   (wartet nie auf volle Empfangs-Queues)
//! - Sync: eine Probe sofort, danach alle `sync_intervall`

use beatsync_core::types::{DeviceId, SessionId};
use beatsync_protocol::{
    ClientNachricht, ClockEstimate, RelayArt, RelayNachricht, ServerEreignis, ServerNachricht,
    SessionInfo,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::clock::{ClockSync, SYNC_INTERVALL};
use crate::error::{ClientError, ClientResult};

/// Wartezeit auf direkte Antworten des Servers
const ANTWORT_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Verbindungsparameter
#[derive(Debug, Clone)]
pub struct ClientKonfig {
    /// WebSocket-URL, z.B. `ws://localhost:8081/ws`
    pub url: String,
    /// Abstand zwischen zwei Clock-Sync-Proben
    pub sync_intervall: Duration,
    /// Groesse der Sende- und Empfangspuffer
    pub puffer: usize,
}

impl ClientKonfig {
    pub fn neu(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sync_intervall: SYNC_INTERVALL,
            puffer: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// SyncClient
// ---------------------------------------------------------------------------

/// Verbindung zum Relay mit laufender Uhrensynchronisation
pub struct SyncClient {
    ausgang: mpsc::Sender<Message>,
    antworten: mpsc::Receiver<ServerNachricht>,
    relay: mpsc::Receiver<RelayNachricht>,
    uhr: Arc<ClockSync>,
    session_id: Option<SessionId>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncClient {
    /// Baut die WebSocket-Verbindung auf und startet den Clock-Sync
    pub async fn verbinden(konfig: ClientKonfig) -> ClientResult<Self> {
        tracing::info!(url = %konfig.url, "Verbinde mit Relay");
        let (ws, _) = tokio_tungstenite::connect_async(konfig.url.as_str()).await?;
        let (mut ws_sender, mut ws_receiver) = ws.split();

        let puffer = konfig.puffer.max(1);
        let (ausgang_tx, mut ausgang_rx) = mpsc::channel::<Message>(puffer);
        let (antwort_tx, antwort_rx) = mpsc::channel::<ServerNachricht>(puffer);
        let (relay_tx, relay_rx) = mpsc::channel::<RelayNachricht>(puffer);
        let uhr = Arc::new(ClockSync::neu());

        let schreiber = tokio::spawn(async move {
            while let Some(nachricht) = ausgang_rx.recv().await {
                let schliessen = matches!(nachricht, Message::Close(_));
                if let Err(e) = ws_sender.send(nachricht).await {
                    tracing::debug!(fehler = %e, "Senden fehlgeschlagen");
                    break;
                }
                if schliessen {
                    break;
                }
            }
        });

        let leser_uhr = Arc::clone(&uhr);
        let leser = tokio::spawn(async move {
            while let Some(eingang) = ws_receiver.next().await {
                let text = match eingang {
                    Ok(Message::Text(text)) => text.to_string(),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!(fehler = %e, "WebSocket-Lesefehler");
                        break;
                    }
                };
                match ServerEreignis::aus_json(&text) {
                    Ok(ServerEreignis::Antwort(ServerNachricht::Pong { timestamp, data })) => {
                        leser_uhr.pong_verarbeiten(timestamp, &data);
                    }
                    Ok(ServerEreignis::Antwort(antwort)) => {
                        if !einreihen(&antwort_tx, antwort, "Antwort") {
                            break;
                        }
                    }
                    Ok(ServerEreignis::Relay(nachricht)) => {
                        if !einreihen(&relay_tx, nachricht, "Relay-Nachricht") {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(fehler = %e, "Unbekannte Server-Nachricht verworfen");
                    }
                }
            }
            tracing::info!("Verbindung zum Relay beendet");
        });

        let sync_uhr = Arc::clone(&uhr);
        let sync_ausgang = ausgang_tx.clone();
        let intervall = konfig.sync_intervall;
        let sync = tokio::spawn(async move {
            // Erster Tick feuert sofort
            let mut takt = tokio::time::interval(intervall);
            loop {
                takt.tick().await;
                let probe = match sync_uhr.probe().to_json() {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::error!(fehler = %e, "Probe nicht serialisierbar");
                        break;
                    }
                };
                if sync_ausgang.send(Message::Text(probe)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            ausgang: ausgang_tx,
            antworten: antwort_rx,
            relay: relay_rx,
            uhr,
            session_id: None,
            tasks: vec![schreiber, leser, sync],
        })
    }

    async fn senden(&self, nachricht: &ClientNachricht) -> ClientResult<()> {
        let text = nachricht.to_json()?;
        self.ausgang
            .send(Message::Text(text))
            .await
            .map_err(|_| ClientError::Getrennt)
    }

    /// Tritt einer Session bei (`None` = Standard-Session)
    pub async fn beitreten(
        &mut self,
        session_id: Option<SessionId>,
        device_id: DeviceId,
        nickname: Option<String>,
    ) -> ClientResult<()> {
        let session_id = session_id.unwrap_or_else(SessionId::standard);
        self.senden(&ClientNachricht::Beitreten {
            session_id: session_id.clone(),
            device_id,
            nickname,
        })
        .await?;
        self.session_id = Some(session_id);
        Ok(())
    }

    /// Erstellt eine neue Session und wartet auf `session_created`
    pub async fn session_erstellen(
        &mut self,
        device_id: DeviceId,
        session_name: Option<String>,
    ) -> ClientResult<SessionInfo> {
        self.senden(&ClientNachricht::SessionErstellen {
            device_id,
            session_name,
        })
        .await?;

        let antworten = &mut self.antworten;
        let info = tokio::time::timeout(ANTWORT_TIMEOUT, async {
            loop {
                match antworten.recv().await {
                    Some(ServerNachricht::SessionCreated { session_info, .. }) => {
                        return Ok(session_info)
                    }
                    Some(_) => continue,
                    None => return Err(ClientError::Getrennt),
                }
            }
        })
        .await
        .map_err(|_| ClientError::Zeitueberschreitung("session_created"))??;

        self.session_id = Some(info.session_id.clone());
        Ok(info)
    }

    /// Sendet ein Wiedergabe-Kommando an die anderen Mitglieder
    ///
    /// `timestamp` ist die geschaetzte Serverzeit beim Senden.
    pub async fn kommando_senden(&self, art: RelayArt, data: Option<Value>) -> ClientResult<()> {
        let session_id = self.session_id.as_ref().ok_or(ClientError::KeineSession)?;
        let mut nachricht = RelayNachricht::neu(art, data);
        nachricht.feld_setzen("sessionId", json!(session_id));
        nachricht.feld_setzen("timestamp", json!(self.uhr.server_zeit()));
        self.senden(&ClientNachricht::Relay(nachricht)).await
    }

    /// Naechste empfangene Relay-Nachricht (None nach Verbindungsende)
    pub async fn naechste_nachricht(&mut self) -> Option<RelayNachricht> {
        self.relay.recv().await
    }

    /// Wartet bis eine Uhren-Schaetzung vorliegt
    pub async fn auf_sync_warten(&self, timeout: Duration) -> ClientResult<ClockEstimate> {
        let mut rx = self.uhr.abonnieren();
        let warten = async {
            loop {
                let aktuell = *rx.borrow_and_update();
                if let Some(s) = aktuell {
                    return Ok(s);
                }
                if rx.changed().await.is_err() {
                    return Err(ClientError::Getrennt);
                }
            }
        };
        tokio::time::timeout(timeout, warten)
            .await
            .map_err(|_| ClientError::Zeitueberschreitung("pong"))?
    }

    /// Aktuelle Uhren-Schaetzung
    pub fn schaetzung(&self) -> Option<ClockEstimate> {
        self.uhr.schaetzung()
    }

    /// Geschaetzte Serverzeit in ms
    pub fn server_zeit(&self) -> f64 {
        self.uhr.server_zeit()
    }

    /// Zuletzt beigetretene oder erstellte Session
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Schliesst die Verbindung mit einem Close-Frame
    pub async fn trennen(mut self) {
        let _ = self.ausgang.send(Message::Close(None)).await;
        let mut tasks = std::mem::take(&mut self.tasks).into_iter();
        if let Some(schreiber) = tasks.next() {
            let _ = tokio::time::timeout(Duration::from_secs(1), schreiber).await;
        }
        for task in tasks {
            task.abort();
        }
    }
}

/// Reiht ohne zu warten ein; eine volle Queue verwirft die Nachricht
///
/// Der Leser blockiert nie, damit Pongs auch bei ungelesenen
/// Relay-Nachrichten verarbeitet werden. `false` wenn der Empfaenger weg ist.
fn einreihen<T>(tx: &mpsc::Sender<T>, nachricht: T, art: &'static str) -> bool {
    match tx.try_send(nachricht) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(art, "Empfangs-Queue voll, Nachricht verworfen");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
