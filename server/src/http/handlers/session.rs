//! HTTP-Handler fuer Session-Abfragen

use axum::{
    extract::{Path, State},
    response::Json,
};
use beatsync_core::{BeatSyncError, SessionId};
use beatsync_protocol::SessionInfo;
use serde_json::{json, Value};

use crate::http::{ApiResult, HttpState};

/// GET /session/:id/validate
pub async fn validate_session(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Json<Value> {
    let exists = state.relay.session_existiert(&SessionId::neu(id));
    Json(json!({ "exists": exists }))
}

/// GET /session/:id
pub async fn get_session(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionInfo>> {
    state
        .relay
        .session_info(&SessionId::neu(id.as_str()))
        .map(Json)
        .ok_or_else(|| BeatSyncError::SessionNichtGefunden(id).into())
}
