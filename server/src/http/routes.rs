//! Route-Definitionen der HTTP-Schnittstelle

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::http::{handlers, HttpState};

/// Platz fuer Multipart-Header und Boundaries ueber der reinen Dateigroesse
const MULTIPART_RESERVE: usize = 64 * 1024;

/// Erstellt den Router fuer Sessions und Audio
pub fn http_router(state: HttpState) -> Router {
    let body_limit = state.uploads.max_bytes().saturating_add(MULTIPART_RESERVE);

    Router::new()
        // Sessions
        .route(
            "/session/:id/validate",
            get(handlers::session::validate_session),
        )
        .route("/session/:id", get(handlers::session::get_session))
        // Audio
        .route(
            "/upload",
            post(handlers::audio::upload_audio).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/audio", get(handlers::audio::get_audio))
        .with_state(state)
}
