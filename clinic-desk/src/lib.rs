use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{appointments as appointment_routes, auth, chat, intake, profile},
    metrics::{metrics_handler, metrics_middleware},
    state::DeskState,
};

pub mod appointments;
pub mod config;
pub mod conversations;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod session;
pub mod state;
pub mod store;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn desk_route(state: Arc<DeskState>) -> Router {
    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/appointments", get(appointment_routes::list_appointments))
        .route(
            "/appointments/{id}/approve",
            post(appointment_routes::approve_appointment),
        )
        .route(
            "/appointments/{id}/reject",
            post(appointment_routes::reject_appointment),
        )
        .route("/chat/conversations", get(chat::list_conversations))
        .route("/chat/conversations/{id}", delete(chat::delete_conversation))
        .route(
            "/chat/conversations/{id}/messages",
            get(chat::get_messages).post(chat::send_message),
        )
        .route("/chat/conversations/{id}/read", post(chat::mark_read))
        .route("/intake/appointments", post(intake::book_appointment))
        .route("/intake/messages", post(intake::post_patient_message))
        .route(
            "/intake/conversations/{id}",
            delete(intake::patient_delete),
        )
        .route(
            "/intake/conversations/{id}/read",
            post(intake::patient_mark_read),
        )
        .route(
            "/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route(
            "/settings",
            get(profile::get_settings).put(profile::update_settings),
        );

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Browser dashboards send the session cookie, so CORS must name an origin.
pub fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = HeaderValue::from_str(origin).ok()?;
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}
