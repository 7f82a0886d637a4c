use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ClinicSession, JsonBody, owned_conversation};
use crate::{
    conversations::DeleteOutcome,
    error::DeskResult,
    models::{MessageKind, SenderRole},
    state::DeskState,
};

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

pub async fn list_conversations(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
) -> DeskResult<Json<Value>> {
    let conversations = state.conversations.list_for_clinic(&auth.clinic.id).await?;
    let unread_total: u64 = conversations.iter().map(|c| c.unread_count as u64).sum();

    Ok(Json(json!({
        "success": true,
        "unreadTotal": unread_total,
        "conversations": conversations,
    })))
}

pub async fn get_messages(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
    Path(conversation_id): Path<String>,
) -> DeskResult<Json<Value>> {
    let conversation = owned_conversation(&state, &auth.clinic, &conversation_id).await?;
    let messages = state.conversations.messages(&conversation.id).await?;

    Ok(Json(json!({
        "success": true,
        "conversation": conversation,
        "messages": messages,
    })))
}

pub async fn send_message(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
    Path(conversation_id): Path<String>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> DeskResult<Json<Value>> {
    owned_conversation(&state, &auth.clinic, &conversation_id).await?;
    let (message, conversation) = state
        .conversations
        .append_message(
            &conversation_id,
            &auth.clinic.id,
            SenderRole::Clinic,
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

pub async fn mark_read(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
    Path(conversation_id): Path<String>,
) -> DeskResult<Json<Value>> {
    owned_conversation(&state, &auth.clinic, &conversation_id).await?;
    let conversation = state
        .conversations
        .mark_read(&conversation_id, SenderRole::Clinic)
        .await?;

    Ok(Json(json!({
        "success": true,
        "conversation": conversation,
    })))
}

pub async fn delete_conversation(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
    Path(conversation_id): Path<String>,
) -> DeskResult<Json<Value>> {
    owned_conversation(&state, &auth.clinic, &conversation_id).await?;
    let outcome = state
        .conversations
        .soft_delete(&conversation_id, SenderRole::Clinic)
        .await?;

    Ok(Json(json!({
        "success": true,
        "outcome": outcome,
        "purged": outcome == DeleteOutcome::Purged,
    })))
}
