//! Client-seitige Uhrensynchronisation
//!
//! Haelt die aktuelle `ClockEstimate` und rechnet lokale Zeit in
//! Serverzeit um. Eine fehlende Antwort laesst die vorherige Schaetzung
//! in Kraft.

use beatsync_protocol::{ClientNachricht, ClockEstimate, MonotoneUhr, PongData};
use tokio::sync::watch;

/// Standard-Intervall zwischen zwei Proben
pub const SYNC_INTERVALL: std::time::Duration = std::time::Duration::from_secs(5);

/// Uhrenabgleich mit dem Server
#[derive(Debug)]
pub struct ClockSync {
    uhr: MonotoneUhr,
    schaetzung: watch::Sender<Option<ClockEstimate>>,
}

impl ClockSync {
    pub fn neu() -> Self {
        let (schaetzung, _) = watch::channel(None);
        Self {
            uhr: MonotoneUhr::starten(),
            schaetzung,
        }
    }

    /// Lokale Zeit in ms
    pub fn lokal_ms(&self) -> f64 {
        self.uhr.jetzt_ms()
    }

    /// Erstellt eine neue Probe mit `t1 = jetzt`
    pub fn probe(&self) -> ClientNachricht {
        ClientNachricht::Ping { t1: self.lokal_ms() }
    }

    /// Verarbeitet eine Pong-Antwort (`t4 = jetzt`) und ersetzt die Schaetzung
    pub fn pong_verarbeiten(&self, timestamp: f64, data: &PongData) -> ClockEstimate {
        let t4 = self.lokal_ms();
        let neu = ClockEstimate::aus_pong(data, timestamp, t4);
        tracing::trace!(
            offset = neu.offset,
            rtt = neu.round_trip_time,
            "Uhren-Schaetzung aktualisiert"
        );
        self.schaetzung.send_replace(Some(neu));
        neu
    }

    /// Aktuelle Schaetzung (None vor dem ersten Pong)
    pub fn schaetzung(&self) -> Option<ClockEstimate> {
        *self.schaetzung.borrow()
    }

    /// Serverzeit: lokale Zeit plus Offset (Offset 0 ohne Schaetzung)
    pub fn server_zeit(&self) -> f64 {
        let offset = self.schaetzung().map(|s| s.offset).unwrap_or(0.0);
        self.lokal_ms() + offset
    }

    /// Beobachter fuer neue Schaetzungen
    pub fn abonnieren(&self) -> watch::Receiver<Option<ClockEstimate>> {
        self.schaetzung.subscribe()
    }
}

impl Default for ClockSync {
    fn default() -> Self {
        Self::neu()
    }
}
