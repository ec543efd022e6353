//! Clock-Sync – NTP-artige Offset- und RTT-Schaetzung
//!
//! Ablauf pro Probe:
//! ```text
//! Client  t1 ──ping──▶  Server (t2 = t3 = Serverzeit bei Antwort)
//! Client  t4 ◀──pong──  Server
//! ```
//! - `round_trip_time = t4 - t1`
//! - `offset = ((t2 - t1) + (t3 - t4)) / 2`
//!
//! Die Schaetzung setzt symmetrische Netzwerklatenz voraus. Der Server
//! modelliert keine Verarbeitungszeit, daher gilt immer `t2 == t3`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Zeitstempel einer Pong-Antwort
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PongData {
    /// Sendezeit des Clients (Echo)
    pub t1: f64,
    /// Empfangszeit des Servers
    pub t2: f64,
    /// Sendezeit des Servers
    pub t3: f64,
}

/// Aktuelle Uhren-Schaetzung eines Clients
///
/// Wird bei jedem Pong vollstaendig ersetzt, nie teilweise aktualisiert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockEstimate {
    /// Geschaetzte Differenz Serverzeit minus Clientzeit in ms
    pub offset: f64,
    /// Gemessene Round-Trip-Time in ms
    pub round_trip_time: f64,
    /// Zeitpunkt der letzten erfolgreichen Messung
    pub last_sync_at: DateTime<Utc>,
}

impl ClockEstimate {
    /// Berechnet eine neue Schaetzung aus den vier Zeitstempeln
    pub fn berechnen(t1: f64, t2: f64, t3: f64, t4: f64, last_sync_at: DateTime<Utc>) -> Self {
        Self {
            offset: ((t2 - t1) + (t3 - t4)) / 2.0,
            round_trip_time: t4 - t1,
            last_sync_at,
        }
    }

    /// Berechnet eine Schaetzung aus einer Pong-Antwort und der Empfangszeit `t4`
    ///
    /// `t3` stammt aus dem Top-Level-`timestamp` der Pong-Nachricht.
    pub fn aus_pong(data: &PongData, t3: f64, t4: f64) -> Self {
        Self::berechnen(data.t1, data.t2, t3, t4, Utc::now())
    }

    /// Rechnet eine lokale Zeit in Serverzeit um
    pub fn server_zeit(&self, lokal_ms: f64) -> f64 {
        lokal_ms + self.offset
    }
}

/// Monotone Millisekunden-Uhr ab ihrem Erstellungszeitpunkt
///
/// Server und Clients benutzen jeweils ihre eigene Instanz; nur der
/// geschaetzte Offset verbindet beide Zeitachsen.
#[derive(Debug, Clone, Copy)]
pub struct MonotoneUhr {
    start: Instant,
}

impl MonotoneUhr {
    /// Startet eine neue Uhr bei 0 ms
    pub fn starten() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Vergangene Zeit seit dem Start in Millisekunden
    pub fn jetzt_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for MonotoneUhr {
    fn default() -> Self {
        Self::starten()
    }
}
