//! HTTP-Schnittstelle neben dem WebSocket-Relay
//!
//! Session-Abfragen, Audio-Upload und Audio-Auslieferung. Fehler werden als
//! `{"error": "..."}` mit passendem Statuscode beantwortet.

pub mod handlers;
pub mod routes;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use beatsync_core::BeatSyncError;
use beatsync_media::{DiskStorage, MediaError, UploadService};
use beatsync_observability::BeatSyncMetrics;
use beatsync_relay::RelayState;
use serde_json::json;
use std::sync::Arc;

pub use routes::http_router;

/// Geteilter Zustand der HTTP-Handler
#[derive(Clone)]
pub struct HttpState {
    pub relay: Arc<RelayState>,
    pub uploads: Arc<UploadService<DiskStorage>>,
    pub metriken: BeatSyncMetrics,
}

/// Fehler eines HTTP-Handlers
#[derive(Debug)]
pub enum ApiFehler {
    /// Pflichtparameter fehlt oder ist ungueltig
    UngueltigeAnfrage(String),
    Media(MediaError),
    Multipart(MultipartError),
    Kern(BeatSyncError),
}

impl ApiFehler {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::UngueltigeAnfrage(_) => StatusCode::BAD_REQUEST,
            Self::Media(e) => match e {
                MediaError::DateiNichtGefunden(_) => StatusCode::NOT_FOUND,
                MediaError::DateiZuGross { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                MediaError::UngueltigerName(_) | MediaError::LeereDatei => {
                    StatusCode::BAD_REQUEST
                }
                MediaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Multipart(e) => e.status(),
            Self::Kern(e) => match e {
                BeatSyncError::SessionNichtGefunden(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn meldung(&self) -> String {
        match self {
            Self::UngueltigeAnfrage(m) => m.clone(),
            Self::Media(e) => e.to_string(),
            Self::Multipart(e) => e.body_text(),
            Self::Kern(e) => e.to_string(),
        }
    }
}

impl From<MediaError> for ApiFehler {
    fn from(e: MediaError) -> Self {
        Self::Media(e)
    }
}

impl From<MultipartError> for ApiFehler {
    fn from(e: MultipartError) -> Self {
        Self::Multipart(e)
    }
}

impl From<BeatSyncError> for ApiFehler {
    fn from(e: BeatSyncError) -> Self {
        Self::Kern(e)
    }
}

impl IntoResponse for ApiFehler {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), fehler = %self.meldung(), "HTTP-Anfrage fehlgeschlagen");
        } else {
            tracing::debug!(status = status.as_u16(), fehler = %self.meldung(), "HTTP-Anfrage abgelehnt");
        }
        (status, Json(json!({ "error": self.meldung() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiFehler>;
