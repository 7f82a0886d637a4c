use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{ClinicSession, JsonBody};
use crate::{
    error::{DeskError, DeskResult},
    models::ClinicProfile,
    session::{cleared_cookie, session_cookie},
    state::DeskState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub clinic_id: String,
    pub api_key: String,
}

pub async fn login(
    State(state): State<Arc<DeskState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> DeskResult<impl IntoResponse> {
    if req.clinic_id.trim().is_empty() || req.api_key.is_empty() {
        return Err(DeskError::Validation("clinicId and apiKey are required".into()));
    }

    let clinic = state
        .store
        .get_clinic(&req.clinic_id)
        .await?
        .filter(|clinic| clinic.api_key == req.api_key);
    let Some(clinic) = clinic else {
        warn!(clinic_id = %req.clinic_id, "rejected login");
        return Err(DeskError::Unauthorized);
    };

    let session = state.sessions.create(&clinic.id).await;
    let cookie = session_cookie(&session, state.sessions.ttl());
    info!(clinic_id = %clinic.id, "clinic logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "clinic": ClinicProfile::from(&clinic),
            "expiresAt": session.expires_at,
        })),
    ))
}

pub async fn logout(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
) -> impl IntoResponse {
    state.sessions.revoke(&auth.session.id).await;
    info!(clinic_id = %auth.clinic.id, "clinic logged out");

    (
        [(header::SET_COOKIE, cleared_cookie())],
        Json(json!({ "success": true })),
    )
}
