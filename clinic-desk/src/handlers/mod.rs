use std::sync::Arc;

use axum::{
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{header, request::Parts},
};

use crate::{
    error::DeskError,
    models::{Clinic, Conversation},
    session::{Session, token_from_cookie_header},
    state::DeskState,
};

pub mod appointments;
pub mod auth;
pub mod chat;
pub mod intake;
pub mod profile;

pub const INTAKE_KEY_HEADER: &str = "x-intake-key";

/// JSON body whose rejections use the desk's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(DeskError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for DeskError {
    fn from(rejection: JsonRejection) -> Self {
        DeskError::Validation(rejection.body_text())
    }
}

/// Query string whose rejections use the desk's error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(DeskError))]
pub struct QueryParams<T>(pub T);

impl From<QueryRejection> for DeskError {
    fn from(rejection: QueryRejection) -> Self {
        DeskError::Validation(rejection.body_text())
    }
}

/// The clinic behind the request's `sessionId` cookie.
pub struct ClinicSession {
    pub session: Session,
    pub clinic: Clinic,
}

impl FromRequestParts<Arc<DeskState>> for ClinicSession {
    type Rejection = DeskError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<DeskState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(token_from_cookie_header)
            .ok_or(DeskError::Unauthorized)?;

        let session = state
            .sessions
            .get(token)
            .await
            .ok_or(DeskError::Unauthorized)?;

        let clinic = state
            .store
            .get_clinic(&session.clinic_id)
            .await?
            .ok_or(DeskError::Unauthorized)?;

        Ok(Self { session, clinic })
    }
}

/// Marker for requests from the patient-facing system.
pub struct IntakeKey;

impl FromRequestParts<Arc<DeskState>> for IntakeKey {
    type Rejection = DeskError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<DeskState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(INTAKE_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(DeskError::Unauthorized)?;

        if presented != state.intake_api_key {
            return Err(DeskError::Unauthorized);
        }
        Ok(IntakeKey)
    }
}

/// Loads a conversation and checks the clinic is a party to it.
pub(crate) async fn owned_conversation(
    state: &DeskState,
    clinic: &Clinic,
    conversation_id: &str,
) -> Result<Conversation, DeskError> {
    let conversation = state.conversations.get(conversation_id).await?;
    if conversation.clinic_id != clinic.id {
        return Err(DeskError::Forbidden(
            "conversation belongs to a different clinic".into(),
        ));
    }
    Ok(conversation)
}
