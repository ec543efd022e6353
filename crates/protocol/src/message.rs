//! Nachrichten-Protokoll (WebSocket, JSON-Textframes)
//!
//! Definiert alle Nachrichten die zwischen Client und Relay ausgetauscht
//! werden.
//!
//! ## Design
//! - Jede Nachricht ist ein JSON-Objekt mit einem `type`-Tag
//! - Eingehende Nachrichten werden an der Grenze in den geschlossenen
//!   Enum `ClientNachricht` uebersetzt und pro Variante validiert
//! - Relay-Nachrichten (`play`, `pause`, `seek`, `upload`, `position`)
//!   behalten ihr Original-Objekt, damit Empfaenger eine unveraenderte
//!   Kopie (bis auf `timestamp`) erhalten

use beatsync_core::types::{DeviceId, SessionId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::clock::PongData;

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Klassifikation eines Nachrichtenfehlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FehlerArt {
    /// Kaputtes JSON, fehlender oder unbekannter Typ
    Protokoll,
    /// Bekannter Typ, aber Pflichtfeld fehlt oder ist ungueltig
    Validierung,
}

/// Fehler beim Parsen oder Validieren einer eingehenden Nachricht
#[derive(Debug, Error)]
pub enum NachrichtenFehler {
    #[error("Ungueltiges JSON: {0}")]
    UngueltigesJson(#[source] serde_json::Error),

    #[error("Nachricht ist kein JSON-Objekt")]
    KeinObjekt,

    #[error("Feld 'type' fehlt")]
    TypFehlt,

    #[error("Unbekannter Nachrichtentyp: {0}")]
    UnbekannterTyp(String),

    #[error("Pflichtfeld fehlt: {0}")]
    FeldFehlt(&'static str),

    #[error("Ungueltiges Feld '{feld}': {grund}")]
    UngueltigesFeld { feld: &'static str, grund: String },

    #[error("Falscher Feldtyp: {0}")]
    Feldtyp(#[source] serde_json::Error),
}

impl NachrichtenFehler {
    /// Ordnet den Fehler der Protokoll- oder Validierungs-Kategorie zu
    pub fn art(&self) -> FehlerArt {
        match self {
            Self::UngueltigesJson(_) | Self::KeinObjekt | Self::TypFehlt | Self::UnbekannterTyp(_) => {
                FehlerArt::Protokoll
            }
            Self::FeldFehlt(_) | Self::UngueltigesFeld { .. } | Self::Feldtyp(_) => {
                FehlerArt::Validierung
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Relay-Nachrichten
// ---------------------------------------------------------------------------

/// Typ einer Relay-Nachricht (wird an die anderen Session-Mitglieder verteilt)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayArt {
    Play,
    Pause,
    Seek,
    Upload,
    Position,
}

impl RelayArt {
    /// Alle Relay-Typen
    pub const ALLE: [RelayArt; 5] = [
        RelayArt::Play,
        RelayArt::Pause,
        RelayArt::Seek,
        RelayArt::Upload,
        RelayArt::Position,
    ];

    /// Ordnet einen `type`-String einem Relay-Typ zu
    pub fn aus_typ(typ: &str) -> Option<Self> {
        match typ {
            "play" => Some(Self::Play),
            "pause" => Some(Self::Pause),
            "seek" => Some(Self::Seek),
            "upload" => Some(Self::Upload),
            "position" => Some(Self::Position),
            _ => None,
        }
    }

    /// Wire-Name des Typs
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Seek => "seek",
            Self::Upload => "upload",
            Self::Position => "position",
        }
    }
}

impl std::fmt::Display for RelayArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Validierte Relay-Nachricht mit dem Original-JSON-Objekt
#[derive(Debug, Clone, PartialEq)]
pub struct RelayNachricht {
    art: RelayArt,
    felder: Map<String, Value>,
}

impl RelayNachricht {
    /// Baut eine neue Relay-Nachricht (Client-Seite)
    pub fn neu(art: RelayArt, data: Option<Value>) -> Self {
        let mut felder = Map::new();
        felder.insert("type".into(), Value::String(art.als_str().into()));
        if let Some(data) = data {
            felder.insert("data".into(), data);
        }
        Self { art, felder }
    }

    /// Validiert ein bereits geparstes Objekt gegen die Regeln des Typs
    pub fn aus_felder(art: RelayArt, felder: Map<String, Value>) -> Result<Self, NachrichtenFehler> {
        relay_daten_pruefen(art, &felder)?;
        Ok(Self { art, felder })
    }

    /// Typ der Nachricht
    pub fn art(&self) -> RelayArt {
        self.art
    }

    /// Das `data`-Objekt (falls vorhanden)
    pub fn data(&self) -> Option<&Value> {
        self.felder.get("data").filter(|d| !d.is_null())
    }

    /// Beliebiges Top-Level-Feld
    pub fn feld(&self, name: &str) -> Option<&Value> {
        self.felder.get(name)
    }

    /// Der `timestamp` der Nachricht
    pub fn zeitstempel(&self) -> Option<f64> {
        self.felder.get("timestamp").and_then(Value::as_f64)
    }

    /// Setzt ein Top-Level-Feld (z.B. `sessionId` auf Client-Seite)
    pub fn feld_setzen(&mut self, name: &str, wert: Value) {
        self.felder.insert(name.to_string(), wert);
    }

    /// Kopie mit ueberschriebenem `timestamp`
    pub fn mit_zeitstempel(&self, zeitstempel_ms: f64) -> Self {
        let mut kopie = self.clone();
        kopie
            .felder
            .insert("timestamp".into(), json!(zeitstempel_ms));
        kopie
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.felder)
    }
}

/// Per-Typ-Validierung der Relay-Nutzdaten
fn relay_daten_pruefen(art: RelayArt, felder: &Map<String, Value>) -> Result<(), NachrichtenFehler> {
    let data = match felder.get("data") {
        None | Some(Value::Null) => None,
        Some(Value::Object(o)) => Some(o),
        Some(_) => {
            return Err(NachrichtenFehler::UngueltigesFeld {
                feld: "data",
                grund: "muss ein Objekt sein".into(),
            })
        }
    };

    match art {
        RelayArt::Seek => {
            let zeit = data
                .and_then(|d| d.get("time"))
                .ok_or(NachrichtenFehler::FeldFehlt("data.time"))?;
            if !zeit.is_number() {
                return Err(NachrichtenFehler::UngueltigesFeld {
                    feld: "data.time",
                    grund: "muss eine Zahl sein".into(),
                });
            }
        }
        RelayArt::Upload => {
            let url = data
                .and_then(|d| d.get("url").or_else(|| d.get("audioUrl")))
                .ok_or(NachrichtenFehler::FeldFehlt("data.url"))?;
            if !url.is_string() {
                return Err(NachrichtenFehler::UngueltigesFeld {
                    feld: "data.url",
                    grund: "muss ein String sein".into(),
                });
            }
        }
        RelayArt::Play | RelayArt::Pause | RelayArt::Position => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Alle gueltigen Client-Nachrichten (typsicher, validiert)
#[derive(Debug, Clone, PartialEq)]
pub enum ClientNachricht {
    /// Clock-Sync-Probe mit lokaler Sendezeit `t1`
    Ping { t1: f64 },
    /// Neue Session anlegen
    SessionErstellen {
        device_id: DeviceId,
        session_name: Option<String>,
    },
    /// Session beitreten (`join` / `join_session`)
    Beitreten {
        session_id: SessionId,
        device_id: DeviceId,
        nickname: Option<String>,
    },
    /// Wird an die anderen Session-Mitglieder verteilt
    Relay(RelayNachricht),
}

#[derive(Deserialize)]
struct PingRoh {
    timestamp: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionErstellenRoh {
    device_id: Option<String>,
    session_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BeitretenRoh {
    session_id: Option<String>,
    device_id: Option<String>,
    nickname: Option<String>,
    data: Option<BeitretenDaten>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BeitretenDaten {
    device_id: Option<String>,
    nickname: Option<String>,
}

fn nicht_leer(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn typisiert<T: DeserializeOwned>(felder: Map<String, Value>) -> Result<T, NachrichtenFehler> {
    serde_json::from_value(Value::Object(felder)).map_err(NachrichtenFehler::Feldtyp)
}

/// Parst ein JSON-Objekt und liefert den `type`-Tag
fn objekt_mit_typ(text: &str) -> Result<(String, Map<String, Value>), NachrichtenFehler> {
    let wert: Value = serde_json::from_str(text).map_err(NachrichtenFehler::UngueltigesJson)?;
    let Value::Object(felder) = wert else {
        return Err(NachrichtenFehler::KeinObjekt);
    };
    let typ = match felder.get("type") {
        Some(Value::String(t)) => t.clone(),
        _ => return Err(NachrichtenFehler::TypFehlt),
    };
    Ok((typ, felder))
}

impl ClientNachricht {
    /// Parst und validiert eine eingehende Textnachricht
    pub fn aus_json(text: &str) -> Result<Self, NachrichtenFehler> {
        let (typ, felder) = objekt_mit_typ(text)?;

        match typ.as_str() {
            "ping" => {
                let roh: PingRoh = typisiert(felder)?;
                let t1 = roh.timestamp.ok_or(NachrichtenFehler::FeldFehlt("timestamp"))?;
                Ok(Self::Ping { t1 })
            }
            "create_session" => {
                let roh: SessionErstellenRoh = typisiert(felder)?;
                let device_id = roh
                    .device_id
                    .and_then(nicht_leer)
                    .ok_or(NachrichtenFehler::FeldFehlt("deviceId"))?;
                Ok(Self::SessionErstellen {
                    device_id: DeviceId::neu(device_id),
                    session_name: roh.session_name.and_then(nicht_leer),
                })
            }
            "join" | "join_session" => {
                let roh: BeitretenRoh = typisiert(felder)?;
                let (daten_device, daten_nick) = match roh.data {
                    Some(d) => (d.device_id, d.nickname),
                    None => (None, None),
                };
                let device_id = daten_device
                    .and_then(nicht_leer)
                    .or_else(|| roh.device_id.and_then(nicht_leer))
                    .ok_or(NachrichtenFehler::FeldFehlt("data.deviceId"))?;
                let session_id = roh
                    .session_id
                    .and_then(nicht_leer)
                    .map(SessionId::neu)
                    .unwrap_or_else(SessionId::standard);
                Ok(Self::Beitreten {
                    session_id,
                    device_id: DeviceId::neu(device_id),
                    nickname: daten_nick.or(roh.nickname).and_then(nicht_leer),
                })
            }
            andere => match RelayArt::aus_typ(andere) {
                Some(art) => Ok(Self::Relay(RelayNachricht::aus_felder(art, felder)?)),
                None => Err(NachrichtenFehler::UnbekannterTyp(andere.to_string())),
            },
        }
    }

    /// Serialisiert die Nachricht im Wire-Format (Client-Seite)
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Ping { t1 } => serde_json::to_string(&json!({
                "type": "ping",
                "timestamp": t1,
            })),
            Self::SessionErstellen {
                device_id,
                session_name,
            } => {
                let mut wert = json!({
                    "type": "create_session",
                    "deviceId": device_id,
                });
                if let Some(name) = session_name {
                    wert["sessionName"] = json!(name);
                }
                serde_json::to_string(&wert)
            }
            Self::Beitreten {
                session_id,
                device_id,
                nickname,
            } => {
                let mut data = json!({ "deviceId": device_id });
                if let Some(nick) = nickname {
                    data["nickname"] = json!(nick);
                }
                serde_json::to_string(&json!({
                    "type": "join",
                    "sessionId": session_id,
                    "data": data,
                }))
            }
            Self::Relay(relay) => relay.to_json(),
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Session-Metadaten wie sie an Clients und ueber HTTP ausgeliefert werden
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub device_count: usize,
    pub is_active: bool,
}

/// Direkte Antworten des Servers an den Absender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNachricht {
    /// Antwort auf `ping`; `timestamp` ist zugleich `t3`
    Pong { timestamp: f64, data: PongData },
    /// Antwort auf `create_session`
    #[serde(rename_all = "camelCase")]
    SessionCreated {
        session_id: SessionId,
        session_info: SessionInfo,
    },
}

impl ServerNachricht {
    /// Erstellt eine Pong-Antwort mit `t2 == t3 == server_zeit_ms`
    pub fn pong(t1: f64, server_zeit_ms: f64) -> Self {
        Self::Pong {
            timestamp: server_zeit_ms,
            data: PongData {
                t1,
                t2: server_zeit_ms,
                t3: server_zeit_ms,
            },
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Alles was ein Client vom Server empfangen kann
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEreignis {
    Antwort(ServerNachricht),
    Relay(RelayNachricht),
}

impl ServerEreignis {
    /// Parst eine vom Server empfangene Textnachricht (Client-Seite)
    pub fn aus_json(text: &str) -> Result<Self, NachrichtenFehler> {
        let (typ, felder) = objekt_mit_typ(text)?;
        match typ.as_str() {
            "pong" | "session_created" => Ok(Self::Antwort(typisiert(felder)?)),
            andere => match RelayArt::aus_typ(andere) {
                Some(art) => Ok(Self::Relay(RelayNachricht::aus_felder(art, felder)?)),
                None => Err(NachrichtenFehler::UnbekannterTyp(andere.to_string())),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_wird_geparst() {
        let msg = ClientNachricht::aus_json(r#"{"type":"ping","timestamp":1234.5}"#).unwrap();
        assert_eq!(msg, ClientNachricht::Ping { t1: 1234.5 });
    }

    #[test]
    fn ping_ohne_timestamp_ist_validierungsfehler() {
        let err = ClientNachricht::aus_json(r#"{"type":"ping"}"#).unwrap_err();
        assert_eq!(err.art(), FehlerArt::Validierung);
    }

    #[test]
    fn kaputtes_json_ist_protokollfehler() {
        let err = ClientNachricht::aus_json("{nicht json").unwrap_err();
        assert_eq!(err.art(), FehlerArt::Protokoll);

        let err = ClientNachricht::aus_json("[1,2,3]").unwrap_err();
        assert!(matches!(err, NachrichtenFehler::KeinObjekt));

        let err = ClientNachricht::aus_json(r#"{"data":{}}"#).unwrap_err();
        assert!(matches!(err, NachrichtenFehler::TypFehlt));
    }

    #[test]
    fn unbekannter_typ_ist_protokollfehler() {
        let err = ClientNachricht::aus_json(r#"{"type":"stop"}"#).unwrap_err();
        assert!(matches!(err, NachrichtenFehler::UnbekannterTyp(ref t) if t == "stop"));
        assert_eq!(err.art(), FehlerArt::Protokoll);
    }

    #[test]
    fn create_session_braucht_device_id() {
        let err = ClientNachricht::aus_json(r#"{"type":"create_session"}"#).unwrap_err();
        assert!(matches!(err, NachrichtenFehler::FeldFehlt("deviceId")));

        let err =
            ClientNachricht::aus_json(r#"{"type":"create_session","deviceId":"  "}"#).unwrap_err();
        assert_eq!(err.art(), FehlerArt::Validierung);

        let msg = ClientNachricht::aus_json(
            r#"{"type":"create_session","deviceId":"d1","sessionName":"Party"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientNachricht::SessionErstellen {
                device_id: DeviceId::neu("d1"),
                session_name: Some("Party".into()),
            }
        );
    }

    #[test]
    fn join_mit_data_device_id() {
        let msg = ClientNachricht::aus_json(
            r#"{"type":"join","sessionId":"ABC123","data":{"deviceId":"d1","nickname":"Kueche"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientNachricht::Beitreten {
                session_id: SessionId::neu("ABC123"),
                device_id: DeviceId::neu("d1"),
                nickname: Some("Kueche".into()),
            }
        );
    }

    #[test]
    fn join_session_mit_top_level_device_id() {
        let msg = ClientNachricht::aus_json(
            r#"{"type":"join_session","sessionId":"XYZ789","deviceId":"d2"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientNachricht::Beitreten { ref device_id, .. } if device_id.as_str() == "d2"
        ));
    }

    #[test]
    fn join_ohne_session_id_nutzt_standard() {
        let msg =
            ClientNachricht::aus_json(r#"{"type":"join","data":{"deviceId":"d1"}}"#).unwrap();
        let ClientNachricht::Beitreten { session_id, .. } = msg else {
            panic!("Erwartet Beitreten");
        };
        assert!(session_id.ist_standard());

        let msg = ClientNachricht::aus_json(
            r#"{"type":"join","sessionId":"","data":{"deviceId":"d1"}}"#,
        )
        .unwrap();
        let ClientNachricht::Beitreten { session_id, .. } = msg else {
            panic!("Erwartet Beitreten");
        };
        assert!(session_id.ist_standard());
    }

    #[test]
    fn join_ohne_device_id_ist_validierungsfehler() {
        let err = ClientNachricht::aus_json(r#"{"type":"join","sessionId":"ABC123"}"#).unwrap_err();
        assert_eq!(err.art(), FehlerArt::Validierung);

        let err =
            ClientNachricht::aus_json(r#"{"type":"join","data":"d1"}"#).unwrap_err();
        assert_eq!(err.art(), FehlerArt::Validierung);
    }

    #[test]
    fn relay_behaelt_originalfelder() {
        let msg = ClientNachricht::aus_json(
            r#"{"type":"position","sessionId":"S1","data":{"deviceId":"d1","x":10,"y":20},"timestamp":5.0,"extra":true}"#,
        )
        .unwrap();
        let ClientNachricht::Relay(relay) = msg else {
            panic!("Erwartet Relay");
        };
        assert_eq!(relay.art(), RelayArt::Position);
        assert_eq!(relay.feld("extra"), Some(&Value::Bool(true)));
        assert_eq!(relay.zeitstempel(), Some(5.0));

        let kopie = relay.mit_zeitstempel(99.5);
        assert_eq!(kopie.zeitstempel(), Some(99.5));
        assert_eq!(kopie.data(), relay.data());
        // Original bleibt unveraendert
        assert_eq!(relay.zeitstempel(), Some(5.0));
    }

    #[test]
    fn seek_braucht_numerische_zeit() {
        assert!(ClientNachricht::aus_json(r#"{"type":"seek","data":{"time":42}}"#).is_ok());

        let err = ClientNachricht::aus_json(r#"{"type":"seek"}"#).unwrap_err();
        assert!(matches!(err, NachrichtenFehler::FeldFehlt("data.time")));

        let err =
            ClientNachricht::aus_json(r#"{"type":"seek","data":{"time":"42"}}"#).unwrap_err();
        assert_eq!(err.art(), FehlerArt::Validierung);
    }

    #[test]
    fn upload_akzeptiert_url_oder_audio_url() {
        assert!(ClientNachricht::aus_json(
            r#"{"type":"upload","data":{"url":"/audio?file=a.mp3","filename":"a.mp3"}}"#
        )
        .is_ok());
        assert!(
            ClientNachricht::aus_json(r#"{"type":"upload","data":{"audioUrl":"/audio?file=b"}}"#)
                .is_ok()
        );
        assert!(ClientNachricht::aus_json(r#"{"type":"upload","data":{}}"#).is_err());
    }

    #[test]
    fn play_und_pause_ohne_data_gueltig() {
        assert!(ClientNachricht::aus_json(r#"{"type":"play"}"#).is_ok());
        assert!(ClientNachricht::aus_json(r#"{"type":"pause","data":null}"#).is_ok());
        let err = ClientNachricht::aus_json(r#"{"type":"pause","data":[1]}"#).unwrap_err();
        assert_eq!(err.art(), FehlerArt::Validierung);
    }

    #[test]
    fn pong_wire_format() {
        let json = ServerNachricht::pong(10.0, 25.5).to_json().unwrap();
        let wert: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["type"], "pong");
        assert_eq!(wert["timestamp"], 25.5);
        assert_eq!(wert["data"]["t1"], 10.0);
        assert_eq!(wert["data"]["t2"], 25.5);
        assert_eq!(wert["data"]["t3"], 25.5);
    }

    #[test]
    fn session_created_wire_format() {
        let info = SessionInfo {
            session_id: SessionId::neu("ABC123"),
            name: "Session ABC123".into(),
            created_at: Utc::now(),
            device_count: 1,
            is_active: true,
        };
        let msg = ServerNachricht::SessionCreated {
            session_id: info.session_id.clone(),
            session_info: info,
        };
        let wert: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(wert["type"], "session_created");
        assert_eq!(wert["sessionId"], "ABC123");
        assert_eq!(wert["sessionInfo"]["deviceCount"], 1);
        assert_eq!(wert["sessionInfo"]["isActive"], true);
        assert!(wert["sessionInfo"]["createdAt"].is_string());
    }

    #[test]
    fn client_join_wire_format_wird_vom_server_verstanden() {
        let join = ClientNachricht::Beitreten {
            session_id: SessionId::neu("ABC123"),
            device_id: DeviceId::neu("d1"),
            nickname: None,
        };
        let json = join.to_json().unwrap();
        assert_eq!(ClientNachricht::aus_json(&json).unwrap(), join);
    }

    #[test]
    fn server_ereignis_unterscheidet_antwort_und_relay() {
        let pong = ServerNachricht::pong(1.0, 2.0).to_json().unwrap();
        assert!(matches!(
            ServerEreignis::aus_json(&pong).unwrap(),
            ServerEreignis::Antwort(ServerNachricht::Pong { .. })
        ));

        let relay = r#"{"type":"seek","data":{"time":42},"timestamp":7.0}"#;
        assert!(matches!(
            ServerEreignis::aus_json(relay).unwrap(),
            ServerEreignis::Relay(ref r) if r.art() == RelayArt::Seek
        ));
    }
}
