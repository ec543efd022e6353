//! beatsync-server – Bibliotheks-Root
//!
//! Verdrahtet Relay, HTTP-Routen, Uploads und Observability und stellt den
//! oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;
pub mod http;

use anyhow::Result;
use axum::http::{HeaderValue, Method};
use axum::Router;
use beatsync_media::{DiskStorage, UploadService};
use beatsync_observability::{
    observability_server_starten, request_timing_layer, timing_middleware, BeatSyncMetrics,
    HealthState,
};
use beatsync_relay::{relay_router, RelayEvent, RelayState};
use config::ServerConfig;
use http::{http_router, HttpState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

/// Haelt den Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    relay: Arc<RelayState>,
    metriken: BeatSyncMetrics,
    health: HealthState,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Result<Self> {
        config.pruefen()?;
        let relay = RelayState::neu(config.relay_konfig());
        Ok(Self {
            config,
            relay,
            metriken: BeatSyncMetrics::neu()?,
            health: HealthState::neu(),
        })
    }

    /// Gemeinsamer Relay-Zustand
    pub fn relay(&self) -> &Arc<RelayState> {
        &self.relay
    }

    /// Vollstaendiger Router: WebSocket, HTTP-Routen, CORS und Request-Timing
    pub fn router(&self, shutdown_rx: watch::Receiver<bool>) -> Router {
        let storage = Arc::new(DiskStorage::new(&self.config.uploads.verzeichnis));
        let uploads = UploadService::neu(storage, self.config.uploads.max_datei_bytes);

        let http = http_router(HttpState {
            relay: Arc::clone(&self.relay),
            uploads,
            metriken: self.metriken.clone(),
        });

        relay_router(Arc::clone(&self.relay), shutdown_rx)
            .merge(http)
            .layer(axum::middleware::from_fn_with_state(
                self.metriken.clone(),
                timing_middleware,
            ))
            .layer(request_timing_layer())
            .layer(cors_layer(&self.config.netzwerk.cors_origins))
    }

    /// Bindet alle Listener und startet die Subsysteme im Hintergrund
    ///
    /// Reihenfolge:
    /// 1. Upload-Verzeichnis anlegen
    /// 2. HTTP/WebSocket-Listener binden
    /// 3. Metriken-Task an den Relay-Eventstrom haengen
    /// 4. Observability-Server starten (falls aktiviert)
    pub async fn binden(self) -> Result<LaufenderServer> {
        tokio::fs::create_dir_all(&self.config.uploads.verzeichnis).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = self.router(shutdown_rx.clone());

        let listener = tokio::net::TcpListener::bind(self.config.bind_adresse()).await?;
        let adresse = listener.local_addr()?;

        let mut tasks = Vec::new();

        let mut http_shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                while http_shutdown.changed().await.is_ok() {
                    if *http_shutdown.borrow() {
                        break;
                    }
                }
            })
            .await?;
            Ok(())
        }));

        let metriken_task = metriken_task_starten(
            self.relay.events_abonnieren(),
            Arc::clone(&self.relay),
            self.metriken.clone(),
        );

        if self.config.observability.aktiviert {
            let obs_adresse: SocketAddr = self.config.observability_bind_adresse().parse()?;
            tasks.push(tokio::spawn(observability_server_starten(
                obs_adresse,
                self.metriken.clone(),
                self.health.clone(),
                shutdown_rx,
            )));
        }

        self.health.bereitschaft_setzen(true);
        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            uploads = %self.config.uploads.verzeichnis.display(),
            observability = self.config.observability.aktiviert,
            "Server bereit"
        );

        Ok(LaufenderServer {
            adresse,
            relay: self.relay,
            health: self.health,
            shutdown_tx,
            metriken_task,
            tasks,
        })
    }

    /// Startet den Server und laeuft bis zum Shutdown-Signal (Ctrl-C)
    pub async fn starten(self) -> Result<()> {
        let laufend = self.binden().await?;
        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        laufend.beenden().await
    }
}

/// Handle auf einen gebundenen Server
pub struct LaufenderServer {
    /// Tatsaechlich gebundene Adresse (relevant bei Port 0)
    pub adresse: SocketAddr,
    relay: Arc<RelayState>,
    health: HealthState,
    shutdown_tx: watch::Sender<bool>,
    metriken_task: JoinHandle<()>,
    tasks: Vec<JoinHandle<Result<()>>>,
}

impl LaufenderServer {
    pub fn relay(&self) -> &Arc<RelayState> {
        &self.relay
    }

    /// Faehrt alle Subsysteme herunter und wartet auf ihr Ende
    pub async fn beenden(self) -> Result<()> {
        self.health.bereitschaft_setzen(false);
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            task.await??;
        }
        self.metriken_task.abort();
        tracing::info!("Server beendet");
        Ok(())
    }
}

/// CORS: leere Liste erlaubt alle Origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Uebertraegt Relay-Events in die Prometheus-Metriken
fn metriken_task_starten(
    mut events: broadcast::Receiver<RelayEvent>,
    relay: Arc<RelayState>,
    metriken: BeatSyncMetrics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RelayEvent::NachrichtVerteilt { zugestellt, .. }) => {
                    metriken.messages_relayed_total.inc();
                    metriken.deliveries_total.inc_by(zugestellt as f64);
                }
                Ok(RelayEvent::NachrichtVerworfen { grund }) => {
                    metriken
                        .messages_dropped_total
                        .with_label_values(&[grund.als_str()])
                        .inc();
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(anzahl)) => {
                    tracing::warn!(anzahl, "Metriken-Task hat Relay-Events verpasst");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }

            let statistik = relay.statistik();
            metriken
                .connected_devices
                .set(statistik.verbundene_geraete as f64);
            metriken.sessions.set(statistik.sessions as f64);
            metriken
                .sessions_active
                .set(statistik.aktive_sessions as f64);
        }
    })
}
