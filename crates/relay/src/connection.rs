//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task (Leser). Ein zweiter Task leert die Send-Queue in den Socket.
//!
//! ## Lebenszyklus
//! ```text
//! Offen (Handle + Queue, keine Session)
//!     |  join / create_session
//!     v
//! Registriert (Mitglied einer Session)
//!     |  Close, Lesefehler, Shutdown
//!     v
//! Geschlossen (Aufraeumen genau einmal)
//! ```

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::server_state::RelayState;

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer_addr: Option<SocketAddr>,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<RelayState>, peer_addr: Option<SocketAddr>) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        socket: WebSocket,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let (sender, mut sende_rx) = self.state.sender_erstellen();
        let ctx = DispatcherContext::neu(sender);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));
        let peer = self
            .peer_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unbekannt".into());

        tracing::info!(peer = %peer, connection_id = %ctx.connection_id, "Neue Verbindung");

        let (mut ws_sender, mut ws_receiver) = socket.split();

        // Send-Queue -> WebSocket
        let schreiber_peer = peer.clone();
        let schreiber = tokio::spawn(async move {
            while let Some(text) = sende_rx.recv().await {
                if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                    tracing::debug!(peer = %schreiber_peer, fehler = %e, "Senden fehlgeschlagen");
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        // Bereits beendet: sofort aufraeumen
        if *shutdown_rx.borrow() {
            dispatcher.verbindung_geschlossen(&ctx);
            schreiber.abort();
            return;
        }

        loop {
            tokio::select! {
                eingang = ws_receiver.next() => {
                    let text = match eingang {
                        Some(Ok(Message::Text(text))) => text.to_string(),
                        Some(Ok(Message::Binary(daten))) => match String::from_utf8(daten.to_vec()) {
                            Ok(text) => text,
                            Err(_) => {
                                tracing::debug!(peer = %peer, "Binaerframe ohne UTF-8 verworfen");
                                continue;
                            }
                        },
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!(peer = %peer, "Verbindung vom Client getrennt");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer, fehler = %e, "WebSocket-Lesefehler");
                            break;
                        }
                    };

                    tracing::trace!(peer = %peer, laenge = text.len(), "Nachricht empfangen");

                    if let Some(antwort) = dispatcher.dispatch(&text, &ctx) {
                        match antwort.to_json() {
                            Ok(json) => {
                                ctx.sender.senden(json);
                            }
                            Err(e) => {
                                tracing::error!(fehler = %e, "Antwort nicht serialisierbar");
                            }
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer, "Shutdown-Signal – Verbindung wird getrennt");
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende (genau einmal pro Verbindung)
        dispatcher.verbindung_geschlossen(&ctx);
        drop(ctx);
        schreiber.abort();

        tracing::info!(peer = %peer, "Verbindungs-Task beendet");
    }
}
