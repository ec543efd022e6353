//! HTTP-Handler fuer Audio-Upload und -Auslieferung

use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use beatsync_media::{content_type, GespeicherteDatei};
use serde::Deserialize;

use crate::http::{ApiFehler, ApiResult, HttpState};

/// Name des Multipart-Feldes mit der Audiodatei
pub const UPLOAD_FELD: &str = "audio";

/// POST /upload (multipart, Feld `audio`)
pub async fn upload_audio(
    State(state): State<HttpState>,
    mut multipart: Multipart,
) -> ApiResult<Json<GespeicherteDatei>> {
    while let Some(feld) = multipart.next_field().await? {
        if feld.name() != Some(UPLOAD_FELD) {
            continue;
        }
        let original_name = feld.file_name().map(str::to_owned);
        let daten = feld.bytes().await?;
        let datei = state
            .uploads
            .hochladen(original_name.as_deref(), &daten)
            .await?;
        state.metriken.uploads_total.inc();
        return Ok(Json(datei));
    }
    Err(ApiFehler::UngueltigeAnfrage(format!(
        "Multipart-Feld '{UPLOAD_FELD}' fehlt"
    )))
}

#[derive(Debug, Deserialize)]
pub struct AudioQuery {
    pub file: Option<String>,
}

/// GET /audio?file=<name>
pub async fn get_audio(
    State(state): State<HttpState>,
    Query(query): Query<AudioQuery>,
) -> ApiResult<Response> {
    let name = query
        .file
        .ok_or_else(|| ApiFehler::UngueltigeAnfrage("Parameter 'file' fehlt".into()))?;
    let daten = state.uploads.laden(&name).await?;
    Ok(([(header::CONTENT_TYPE, content_type(&name))], daten).into_response())
}
