use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ClinicSession, QueryParams};
use crate::{
    error::{DeskError, DeskResult},
    models::AppointmentStatus,
    state::DeskState,
};

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<AppointmentStatus>,
}

#[derive(Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

pub async fn list_appointments(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
    QueryParams(query): QueryParams<ListQuery>,
) -> DeskResult<Json<Value>> {
    let appointments = state
        .appointments
        .list_for_clinic(&auth.clinic, query.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": appointments.len(),
        "appointments": appointments,
    })))
}

pub async fn approve_appointment(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
    Path(appointment_id): Path<String>,
) -> DeskResult<Json<Value>> {
    let outcome = state
        .appointments
        .approve(&auth.clinic, &appointment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment approved",
        "appointment": outcome.appointment,
        "conversationId": outcome.conversation.map(|c| c.id),
    })))
}

/// The body is optional; an empty request rejects without a reason.
pub async fn reject_appointment(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
    Path(appointment_id): Path<String>,
    body: Bytes,
) -> DeskResult<Json<Value>> {
    let req: RejectRequest = if body.is_empty() {
        RejectRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| DeskError::Validation(format!("invalid request body: {e}")))?
    };

    let outcome = state
        .appointments
        .reject(&auth.clinic, &appointment_id, req.reason.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment rejected",
        "appointment": outcome.appointment,
        "conversationId": outcome.conversation.map(|c| c.id),
    })))
}
