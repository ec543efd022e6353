//! Integration-Tests fuer Dispatcher und RelayState (ohne Netzwerk)

use beatsync_core::types::{ConnectionId, DeviceId, SessionId};
use beatsync_protocol::{RelayArt, RelayNachricht};
use beatsync_relay::{
    ClientSender, DispatcherContext, MessageDispatcher, RelayKonfig, RelayState, Zustellung,
};
use proptest::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

struct Teilnehmer {
    ctx: DispatcherContext,
    rx: mpsc::Receiver<String>,
}

impl Teilnehmer {
    fn alle_empfangen(&mut self) -> Vec<Value> {
        let mut nachrichten = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            nachrichten.push(serde_json::from_str(&text).unwrap());
        }
        nachrichten
    }
}

fn aufbau(konfig: RelayKonfig) -> (Arc<RelayState>, MessageDispatcher) {
    let state = RelayState::neu(konfig);
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    (state, dispatcher)
}

fn teilnehmer(state: &RelayState) -> Teilnehmer {
    let (sender, rx) = state.sender_erstellen();
    Teilnehmer {
        ctx: DispatcherContext::neu(sender),
        rx,
    }
}

fn beitreten(d: &MessageDispatcher, t: &Teilnehmer, session: &str, device: &str) {
    let text = format!(
        r#"{{"type":"join","sessionId":"{}","data":{{"deviceId":"{}"}}}}"#,
        session, device
    );
    assert!(d.dispatch(&text, &t.ctx).is_none());
}

// ---------------------------------------------------------------------------
// Szenarien
// ---------------------------------------------------------------------------

#[test]
fn create_session_ohne_namen() {
    let (state, d) = aufbau(RelayKonfig::default());
    let mut t = teilnehmer(&state);

    let antwort = d
        .dispatch(r#"{"type":"create_session","deviceId":"d1"}"#, &t.ctx)
        .expect("session_created erwartet");
    let wert: Value = serde_json::from_str(&antwort.to_json().unwrap()).unwrap();

    assert_eq!(wert["type"], "session_created");
    let id = wert["sessionId"].as_str().unwrap();
    assert_eq!(id.len(), 6);
    assert!(id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(wert["sessionInfo"]["sessionId"], id);
    assert_eq!(wert["sessionInfo"]["name"], format!("Session {}", id));
    assert_eq!(wert["sessionInfo"]["deviceCount"], 1);
    assert_eq!(wert["sessionInfo"]["isActive"], true);
    assert!(wert["sessionInfo"]["createdAt"].is_string());

    assert!(state.session_existiert(&SessionId::neu(id)));
    // Antwort geht nur ueber den Rueckgabewert, nicht ueber die Queue
    assert!(t.alle_empfangen().is_empty());
}

#[test]
fn seek_wird_an_andere_mitglieder_verteilt() {
    let konfig = RelayKonfig {
        implizite_sessions: true,
        ..RelayKonfig::default()
    };
    let (state, d) = aufbau(konfig);
    let mut d1 = teilnehmer(&state);
    let mut d2 = teilnehmer(&state);

    beitreten(&d, &d1, "ABC123", "d1");
    beitreten(&d, &d2, "ABC123", "d2");

    d.dispatch(
        r#"{"type":"seek","sessionId":"ABC123","data":{"time":42},"timestamp":-5}"#,
        &d1.ctx,
    );

    let empfangen = d2.alle_empfangen();
    assert_eq!(empfangen.len(), 1);
    assert_eq!(empfangen[0]["type"], "seek");
    assert_eq!(empfangen[0]["data"]["time"], 42);
    assert_eq!(empfangen[0]["sessionId"], "ABC123");
    let ts = empfangen[0]["timestamp"].as_f64().unwrap();
    assert!(ts >= 0.0, "Zeitstempel muss vom Server stammen");

    assert!(d1.alle_empfangen().is_empty());
}

#[test]
fn unbekannte_explizite_session_ohne_implizite_sessions() {
    let (state, d) = aufbau(RelayKonfig::default());
    let t = teilnehmer(&state);

    beitreten(&d, &t, "ABC123", "d1");
    assert!(!state.session_existiert(&SessionId::neu("ABC123")));
    assert!(state.verbindung(&t.ctx.connection_id).is_none());
}

#[test]
fn absender_wird_ausgeschlossen_alle_anderen_genau_einmal() {
    let (state, d) = aufbau(RelayKonfig::default());
    let mut alle: Vec<Teilnehmer> = (0..5).map(|_| teilnehmer(&state)).collect();
    for (i, t) in alle.iter().enumerate() {
        beitreten(&d, t, "default", &format!("d{}", i));
    }

    d.dispatch(r#"{"type":"play","data":{"time":0}}"#, &alle[2].ctx);

    for (i, t) in alle.iter_mut().enumerate() {
        let anzahl = t.alle_empfangen().len();
        if i == 2 {
            assert_eq!(anzahl, 0);
        } else {
            assert_eq!(anzahl, 1, "Teilnehmer {} sollte genau eine Kopie erhalten", i);
        }
    }
}

#[test]
fn sessions_sind_isoliert() {
    let konfig = RelayKonfig {
        implizite_sessions: true,
        ..RelayKonfig::default()
    };
    let (state, d) = aufbau(konfig);
    let a1 = teilnehmer(&state);
    let mut a2 = teilnehmer(&state);
    let mut b1 = teilnehmer(&state);

    beitreten(&d, &a1, "AAAAAA", "a1");
    beitreten(&d, &a2, "AAAAAA", "a2");
    beitreten(&d, &b1, "BBBBBB", "b1");

    // Client behauptet eine fremde Session, zaehlt aber nicht
    d.dispatch(
        r#"{"type":"pause","sessionId":"BBBBBB","data":{}}"#,
        &a1.ctx,
    );

    assert_eq!(a2.alle_empfangen().len(), 1);
    assert!(b1.alle_empfangen().is_empty());
}

#[test]
fn doppeltes_schliessen_ist_no_op() {
    let (state, d) = aufbau(RelayKonfig::default());
    let t1 = teilnehmer(&state);
    let t2 = teilnehmer(&state);
    beitreten(&d, &t1, "default", "d1");
    beitreten(&d, &t2, "default", "d2");

    d.verbindung_geschlossen(&t1.ctx);
    let nach_erstem = state.session_info(&SessionId::standard()).unwrap();
    d.verbindung_geschlossen(&t1.ctx);
    let nach_zweitem = state.session_info(&SessionId::standard()).unwrap();

    assert_eq!(nach_erstem, nach_zweitem);
    assert_eq!(nach_zweitem.device_count, 1);
    state.konsistenz_pruefen().unwrap();
}

#[test]
fn alte_verbindung_schliesst_nach_uebernahme_nichts() {
    let (state, d) = aufbau(RelayKonfig::default());
    let alt = teilnehmer(&state);
    let neu = teilnehmer(&state);

    beitreten(&d, &alt, "default", "d1");
    beitreten(&d, &neu, "default", "d1");
    d.verbindung_geschlossen(&alt.ctx);

    let eintrag = state.verbindung(&neu.ctx.connection_id).unwrap();
    assert_eq!(eintrag.device_id.as_str(), "d1");
    assert_eq!(
        state.session_info(&SessionId::standard()).unwrap().device_count,
        1
    );
    state.konsistenz_pruefen().unwrap();
}

#[test]
fn volle_und_geschlossene_queues_werden_uebersprungen() {
    let state = RelayState::neu(RelayKonfig::default());
    let session = SessionId::standard();

    let (absender, _absender_rx) = state.sender_erstellen();
    let (geschlossen, geschlossen_rx) = state.sender_erstellen();
    let (voll, mut voll_rx) = ClientSender::neu(ConnectionId::new(), 1);
    let (gesund, mut gesund_rx) = state.sender_erstellen();

    for (sender, device) in [
        (&absender, "d1"),
        (&geschlossen, "d2"),
        (&voll, "d3"),
        (&gesund, "d4"),
    ] {
        state
            .beitreten(sender, DeviceId::neu(device), session.clone(), None)
            .unwrap();
    }

    // d2 gerade geschlossen (Cleanup noch nicht gelaufen), d3 ohne Platz
    drop(geschlossen_rx);
    assert!(voll.senden("belegt".into()));

    let zustellung = state
        .verteilen(
            &absender.connection_id,
            &RelayNachricht::neu(RelayArt::Play, None),
        )
        .unwrap();
    assert_eq!(
        zustellung,
        Zustellung {
            session_id: session.clone(),
            empfaenger: 3,
            zugestellt: 1,
        }
    );

    let text = gesund_rx.try_recv().unwrap();
    let wert: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(wert["type"], "play");
    assert!(wert["timestamp"].is_number());
    assert!(gesund_rx.try_recv().is_err());

    assert_eq!(voll_rx.try_recv().unwrap(), "belegt");
    assert!(voll_rx.try_recv().is_err());

    // Nach dem Cleanup zaehlt d2 nicht mehr als Empfaenger
    state.verbindung_trennen(&geschlossen.connection_id);
    let zustellung = state
        .verteilen(
            &absender.connection_id,
            &RelayNachricht::neu(RelayArt::Pause, None),
        )
        .unwrap();
    assert_eq!(zustellung.empfaenger, 2);
    assert_eq!(zustellung.zugestellt, 2);
    state.konsistenz_pruefen().unwrap();
}

#[test]
fn ungueltige_relay_daten_werden_nicht_verteilt() {
    let (state, d) = aufbau(RelayKonfig::default());
    let a = teilnehmer(&state);
    let mut b = teilnehmer(&state);
    beitreten(&d, &a, "default", "a");
    beitreten(&d, &b, "default", "b");

    d.dispatch(r#"{"type":"seek","data":{"time":"bald"}}"#, &a.ctx);
    d.dispatch(r#"{"type":"upload","data":{}}"#, &a.ctx);
    d.dispatch(r#"{"type":"play","data":[1,2]}"#, &a.ctx);
    assert!(b.alle_empfangen().is_empty());

    d.dispatch(r#"{"type":"upload","data":{"url":"/audio?file=x.mp3"}}"#, &a.ctx);
    assert_eq!(b.alle_empfangen().len(), 1);
}

// ---------------------------------------------------------------------------
// Reihenfolge unter Nebenlaeufigkeit
// ---------------------------------------------------------------------------

#[test]
fn alle_mitglieder_sehen_dieselbe_reihenfolge() {
    let konfig = RelayKonfig {
        sende_queue_groesse: 1024,
        ..RelayKonfig::default()
    };
    let (state, d) = aufbau(konfig);
    let d = Arc::new(d);

    let sender_anzahl = 4;
    let pro_sender = 50;
    let absender: Vec<Teilnehmer> = (0..sender_anzahl).map(|_| teilnehmer(&state)).collect();
    let mut beobachter: Vec<Teilnehmer> = (0..3).map(|_| teilnehmer(&state)).collect();

    for (i, t) in absender.iter().enumerate() {
        beitreten(&d, t, "default", &format!("s{}", i));
    }
    for (i, t) in beobachter.iter().enumerate() {
        beitreten(&d, t, "default", &format!("o{}", i));
    }

    let threads: Vec<_> = absender
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let d = Arc::clone(&d);
            let ctx = t.ctx.clone();
            std::thread::spawn(move || {
                for n in 0..pro_sender {
                    let text = format!(
                        r#"{{"type":"position","data":{{"sender":{},"n":{}}}}}"#,
                        i, n
                    );
                    d.dispatch(&text, &ctx);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let folgen: Vec<Vec<(u64, u64)>> = beobachter
        .iter_mut()
        .map(|b| {
            b.alle_empfangen()
                .iter()
                .map(|w| {
                    (
                        w["data"]["sender"].as_u64().unwrap(),
                        w["data"]["n"].as_u64().unwrap(),
                    )
                })
                .collect()
        })
        .collect();

    assert_eq!(folgen[0].len(), sender_anzahl * pro_sender);
    for folge in &folgen[1..] {
        assert_eq!(folge, &folgen[0]);
    }

    // Zeitstempel steigen innerhalb der Session monoton
    let mut b = teilnehmer(&state);
    beitreten(&d, &b, "default", "spaet");
    for n in 0..10 {
        let text = format!(r#"{{"type":"position","data":{{"n":{}}}}}"#, n);
        d.dispatch(&text, &absender[0].ctx);
    }
    let zeiten: Vec<f64> = b
        .alle_empfangen()
        .iter()
        .map(|w| w["timestamp"].as_f64().unwrap())
        .collect();
    assert!(zeiten.windows(2).all(|w| w[0] <= w[1]));
}

// ---------------------------------------------------------------------------
// Konsistenz nach beliebigen Ablaeufen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Schritt {
    Beitreten { verbindung: usize, device: usize, session: usize },
    Erstellen { verbindung: usize, device: usize },
    Senden { verbindung: usize },
    Schliessen { verbindung: usize },
}

fn schritt() -> impl Strategy<Value = Schritt> {
    prop_oneof![
        (0..6usize, 0..4usize, 0..3usize).prop_map(|(verbindung, device, session)| {
            Schritt::Beitreten { verbindung, device, session }
        }),
        (0..6usize, 0..4usize)
            .prop_map(|(verbindung, device)| Schritt::Erstellen { verbindung, device }),
        (0..6usize).prop_map(|verbindung| Schritt::Senden { verbindung }),
        (0..6usize).prop_map(|verbindung| Schritt::Schliessen { verbindung }),
    ]
}

proptest! {
    #[test]
    fn registry_und_verzeichnis_bleiben_konsistent(
        schritte in proptest::collection::vec(schritt(), 1..60)
    ) {
        let konfig = RelayKonfig {
            implizite_sessions: true,
            ..RelayKonfig::default()
        };
        let (state, d) = aufbau(konfig);
        let verbindungen: Vec<Teilnehmer> = (0..6).map(|_| teilnehmer(&state)).collect();
        let sessions = ["default", "AAAAAA", "BBBBBB"];

        for s in schritte {
            match s {
                Schritt::Beitreten { verbindung, device, session } => {
                    beitreten(&d, &verbindungen[verbindung], sessions[session], &format!("d{}", device));
                }
                Schritt::Erstellen { verbindung, device } => {
                    let text = format!(r#"{{"type":"create_session","deviceId":"d{}"}}"#, device);
                    d.dispatch(&text, &verbindungen[verbindung].ctx);
                }
                Schritt::Senden { verbindung } => {
                    d.dispatch(r#"{"type":"pause"}"#, &verbindungen[verbindung].ctx);
                }
                Schritt::Schliessen { verbindung } => {
                    d.verbindung_geschlossen(&verbindungen[verbindung].ctx);
                }
            }
            prop_assert!(state.konsistenz_pruefen().is_ok(), "{:?}", state.konsistenz_pruefen());
        }
    }
}
