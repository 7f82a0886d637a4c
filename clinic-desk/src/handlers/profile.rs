use std::sync::Arc;

use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::info;

use super::{ClinicSession, JsonBody};
use crate::{
    error::{DeskError, DeskResult},
    models::{ClinicProfile, ProfileUpdate, SettingsUpdate},
    state::DeskState,
};

pub const POLL_INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 5..=300;

// Uploaded files live in the object store; the desk only keeps their URLs.
fn validate_url(field: &str, value: &str) -> DeskResult<String> {
    let value = value.trim();
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(value.to_string())
    } else {
        Err(DeskError::Validation(format!(
            "{field} must be an http(s) URL"
        )))
    }
}

pub async fn get_profile(auth: ClinicSession) -> Json<Value> {
    Json(json!({
        "success": true,
        "profile": ClinicProfile::from(&auth.clinic),
    }))
}

pub async fn update_profile(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> DeskResult<Json<Value>> {
    let mut clinic = auth.clinic;

    if let Some(name) = update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(DeskError::Validation("name cannot be empty".into()));
        }
        clinic.name = name.to_string();
    }
    if let Some(url) = update.avatar_url {
        clinic.avatar_url = Some(validate_url("avatarUrl", &url)?);
    }
    if let Some(url) = update.certificate_url {
        clinic.certificate_url = Some(validate_url("certificateUrl", &url)?);
    }

    state.store.update_clinic(&clinic).await?;
    info!(clinic_id = %clinic.id, "clinic profile updated");

    Ok(Json(json!({
        "success": true,
        "profile": ClinicProfile::from(&clinic),
    })))
}

pub async fn get_settings(auth: ClinicSession) -> Json<Value> {
    Json(json!({
        "success": true,
        "settings": auth.clinic.settings,
    }))
}

pub async fn update_settings(
    State(state): State<Arc<DeskState>>,
    auth: ClinicSession,
    JsonBody(update): JsonBody<SettingsUpdate>,
) -> DeskResult<Json<Value>> {
    let mut clinic = auth.clinic;

    if let Some(sound) = update.notification_sound {
        clinic.settings.notification_sound = sound;
    }
    if let Some(secs) = update.poll_interval_secs {
        if !POLL_INTERVAL_RANGE.contains(&secs) {
            return Err(DeskError::Validation(format!(
                "pollIntervalSecs must be between {} and {}",
                POLL_INTERVAL_RANGE.start(),
                POLL_INTERVAL_RANGE.end()
            )));
        }
        clinic.settings.poll_interval_secs = secs;
    }

    state.store.update_clinic(&clinic).await?;

    Ok(Json(json!({
        "success": true,
        "settings": clinic.settings,
    })))
}
