//! Prometheus-kompatible Metriken fuer BeatSync
//!
//! Registrierte Metriken:
//! - `beatsync_connected_devices` – Gauge: Aktuell registrierte Geraete
//! - `beatsync_sessions` – Gauge: Bekannte Sessions (auch leere)
//! - `beatsync_sessions_active` – Gauge: Sessions mit mindestens einem Mitglied
//! - `beatsync_messages_relayed_total` – Counter: Verteilte Relay-Nachrichten
//! - `beatsync_deliveries_total` – Counter: Eingereihte Einzelkopien
//! - `beatsync_messages_dropped_total` – Counter: Verworfene Nachrichten (reason)
//! - `beatsync_uploads_total` – Counter: Gespeicherte Uploads
//! - `beatsync_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `beatsync_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Counter, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle BeatSync-Prometheus-Metriken
#[derive(Clone)]
pub struct BeatSyncMetrics {
    pub registry: Arc<Registry>,

    // Relay-Metriken
    pub connected_devices: Gauge,
    pub sessions: Gauge,
    pub sessions_active: Gauge,
    pub messages_relayed_total: Counter,
    pub deliveries_total: Counter,
    pub messages_dropped_total: IntCounterVec,

    // Upload-Metriken
    pub uploads_total: Counter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl BeatSyncMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Relay-Metriken ---
        let connected_devices = Gauge::with_opts(Opts::new(
            "beatsync_connected_devices",
            "Anzahl aktuell registrierter Geraete",
        ))?;
        registry.register(Box::new(connected_devices.clone()))?;

        let sessions = Gauge::with_opts(Opts::new(
            "beatsync_sessions",
            "Anzahl bekannter Sessions",
        ))?;
        registry.register(Box::new(sessions.clone()))?;

        let sessions_active = Gauge::with_opts(Opts::new(
            "beatsync_sessions_active",
            "Anzahl Sessions mit mindestens einem Mitglied",
        ))?;
        registry.register(Box::new(sessions_active.clone()))?;

        let messages_relayed_total = Counter::with_opts(Opts::new(
            "beatsync_messages_relayed_total",
            "Gesamtanzahl verteilter Relay-Nachrichten",
        ))?;
        registry.register(Box::new(messages_relayed_total.clone()))?;

        let deliveries_total = Counter::with_opts(Opts::new(
            "beatsync_deliveries_total",
            "Gesamtanzahl eingereihter Einzelkopien",
        ))?;
        registry.register(Box::new(deliveries_total.clone()))?;

        let messages_dropped_total = IntCounterVec::new(
            Opts::new(
                "beatsync_messages_dropped_total",
                "Verworfene eingehende Nachrichten",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(messages_dropped_total.clone()))?;

        // --- Upload-Metriken ---
        let uploads_total = Counter::with_opts(Opts::new(
            "beatsync_uploads_total",
            "Gesamtanzahl gespeicherter Uploads",
        ))?;
        registry.register(Box::new(uploads_total.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("beatsync_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "beatsync_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_devices,
            sessions,
            sessions_active,
            messages_relayed_total,
            deliveries_total,
            messages_dropped_total,
            uploads_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: BeatSyncMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<BeatSyncMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = BeatSyncMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn gauge_connected_devices_setzen() {
        let metriken = BeatSyncMetrics::neu().unwrap();
        metriken.connected_devices.set(3.0);
        assert_eq!(metriken.connected_devices.get(), 3.0);
    }

    #[test]
    fn verworfene_nachrichten_nach_grund() {
        let metriken = BeatSyncMetrics::neu().unwrap();
        metriken
            .messages_dropped_total
            .with_label_values(&["validation"])
            .inc();
        metriken
            .messages_dropped_total
            .with_label_values(&["validation"])
            .inc();
        assert_eq!(
            metriken
                .messages_dropped_total
                .with_label_values(&["validation"])
                .get(),
            2
        );
        assert_eq!(
            metriken
                .messages_dropped_total
                .with_label_values(&["protocol"])
                .get(),
            0
        );
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = BeatSyncMetrics::neu().unwrap();
        metriken.connected_devices.set(5.0);
        metriken.messages_relayed_total.inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("beatsync_connected_devices 5"));
        assert!(output.contains("beatsync_messages_relayed_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn alle_metriken_in_registry_registriert() {
        let metriken = BeatSyncMetrics::neu().unwrap();

        // Vec-Metriken erscheinen in gather() erst nach dem ersten Label-Zugriff
        metriken
            .messages_dropped_total
            .with_label_values(&["state"])
            .inc();
        metriken
            .http_requests_total
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        metriken
            .http_request_duration_seconds
            .with_label_values(&["GET", "/test"])
            .observe(0.01);

        let families = metriken.registry.gather();
        let namen: Vec<&str> = families.iter().map(|f| f.get_name()).collect();

        for name in [
            "beatsync_connected_devices",
            "beatsync_sessions",
            "beatsync_sessions_active",
            "beatsync_messages_relayed_total",
            "beatsync_deliveries_total",
            "beatsync_messages_dropped_total",
            "beatsync_uploads_total",
            "beatsync_http_requests_total",
            "beatsync_http_request_duration_seconds",
        ] {
            assert!(namen.contains(&name), "{name} fehlt");
        }
    }
}
