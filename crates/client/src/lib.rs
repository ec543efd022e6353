//! beatsync-client – Rust-Client fuer das BeatSync-Relay
//!
//! Verbindet sich per WebSocket mit `/ws`, haelt eine laufende
//! NTP-aehnliche Uhrenschaetzung und sendet Wiedergabe-Kommandos mit
//! Serverzeitstempel.
//!
//! ```no_run
//! use beatsync_client::{ClientKonfig, SyncClient};
//! use beatsync_core::types::DeviceId;
//! use beatsync_protocol::RelayArt;
//! use std::time::Duration;
//!
//! # async fn beispiel() -> beatsync_client::ClientResult<()> {
//! let mut client = SyncClient::verbinden(ClientKonfig::neu("ws://localhost:8081/ws")).await?;
//! client.auf_sync_warten(Duration::from_secs(2)).await?;
//! client.session_erstellen(DeviceId::neu("geraet-1"), None).await?;
//! client.kommando_senden(RelayArt::Play, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod connection;
pub mod error;

pub use clock::{ClockSync, SYNC_INTERVALL};
pub use connection::{ClientKonfig, SyncClient};
pub use error::{ClientError, ClientResult};
