//! Endpoints for the patient-facing system. Every route requires the
//! `x-intake-key` header.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{IntakeKey, JsonBody};
use crate::{
    appointments::NewAppointment,
    conversations::DeleteOutcome,
    error::{DeskError, DeskResult},
    models::{DisplayNames, MessageKind, SenderRole},
    state::DeskState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientMessage {
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub patient_avatar_url: Option<String>,
    pub clinic_id: String,
    pub body: String,
}

pub async fn book_appointment(
    State(state): State<Arc<DeskState>>,
    _intake: IntakeKey,
    JsonBody(req): JsonBody<NewAppointment>,
) -> DeskResult<Json<Value>> {
    let outcome = state.appointments.book(req).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "conversation": outcome.conversation,
    })))
}

pub async fn post_patient_message(
    State(state): State<Arc<DeskState>>,
    _intake: IntakeKey,
    JsonBody(req): JsonBody<PatientMessage>,
) -> DeskResult<Json<Value>> {
    if req.patient_id.trim().is_empty() {
        return Err(DeskError::Validation("patientId is required".into()));
    }
    let clinic = state
        .store
        .get_clinic(&req.clinic_id)
        .await?
        .ok_or(DeskError::NotFound("clinic"))?;

    let names = DisplayNames {
        patient_name: req.patient_name,
        patient_avatar_url: req.patient_avatar_url,
        clinic_name: clinic.name.clone(),
        clinic_avatar_url: clinic.avatar_url.clone(),
    };
    let (message, conversation) = state
        .conversations
        .open_with_message(
            &req.patient_id,
            &clinic.id,
            &names,
            &req.patient_id,
            SenderRole::Patient,
            &req.body,
            MessageKind::Text,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": message,
        "conversation": conversation,
    })))
}

pub async fn patient_mark_read(
    State(state): State<Arc<DeskState>>,
    _intake: IntakeKey,
    Path(conversation_id): Path<String>,
) -> DeskResult<Json<Value>> {
    let conversation = state
        .conversations
        .mark_read(&conversation_id, SenderRole::Patient)
        .await?;

    Ok(Json(json!({ "success": true, "conversation": conversation })))
}

pub async fn patient_delete(
    State(state): State<Arc<DeskState>>,
    _intake: IntakeKey,
    Path(conversation_id): Path<String>,
) -> DeskResult<Json<Value>> {
    let outcome = state
        .conversations
        .soft_delete(&conversation_id, SenderRole::Patient)
        .await?;

    Ok(Json(json!({
        "success": true,
        "outcome": outcome,
        "purged": outcome == DeleteOutcome::Purged,
    })))
}
