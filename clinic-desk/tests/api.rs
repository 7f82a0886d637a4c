use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use clinic_desk::{
    desk_route,
    handlers::INTAKE_KEY_HEADER,
    models::{Clinic, ClinicSettings},
    state::{DeskState, DeskStateBuilder},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const INTAKE_KEY: &str = "intake-test-key";

fn clinic(id: &str, name: &str) -> Clinic {
    Clinic {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{id}@example.com"),
        avatar_url: None,
        certificate_url: None,
        api_key: format!("{id}-secret"),
        settings: ClinicSettings::default(),
    }
}

async fn setup() -> (Router, Arc<DeskState>) {
    let state = Arc::new(
        DeskStateBuilder::new(INTAKE_KEY)
            .build()
            .await
            .expect("state"),
    );
    for c in [
        clinic("king", "king Hospital"),
        clinic("city", "City General"),
    ] {
        state.store.insert_clinic(&c).await.expect("seed clinic");
    }
    (desk_route(state.clone()), state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    intake: bool,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if intake {
        builder = builder.header(INTAKE_KEY_HEADER, INTAKE_KEY);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router, clinic_id: &str) -> String {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "clinicId": clinic_id, "apiKey": format!("{clinic_id}-secret") }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("login sets a cookie");
    assert!(set_cookie.contains("HttpOnly"));
    set_cookie.split(';').next().unwrap().to_string()
}

fn booking(clinic_id: Option<&str>, hospital: &str) -> Value {
    json!({
        "patientId": "patient-jo",
        "patientName": "Jo Jo",
        "clinicId": clinic_id,
        "hospital": hospital,
        "department": "Cardiology",
        "date": "2026-11-02",
        "time": "09:30:00",
        "reason": "checkup"
    })
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = setup().await;
    let (status, body) = send(&app, Method::GET, "/health", None, false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn dashboard_routes_need_a_session() {
    let (app, _) = setup().await;

    let (status, body) = send(&app, Method::GET, "/api/appointments", None, false, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/chat/conversations",
        Some("sessionId=cdsess_forged"),
        false,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let (app, _) = setup().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        false,
        Some(json!({ "clinicId": "king", "apiKey": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let (app, _) = setup().await;
    let cookie = login(&app, "king").await;

    let (status, body) = send(&app, Method::GET, "/api/profile", Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["name"], "king Hospital");
    assert!(body["profile"].get("apiKey").is_none());

    let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/api/profile", Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn intake_needs_the_shared_key() {
    let (app, _) = setup().await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/intake/appointments",
        None,
        false,
        Some(booking(Some("king"), "king Hospital")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn approving_a_booking_posts_into_the_conversation() {
    let (app, _) = setup().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/intake/appointments",
        None,
        true,
        Some(booking(Some("king"), "king Hospital")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["appointment"]["status"], "pending");
    assert_eq!(body["conversation"]["unreadCount"], 1);

    let cookie = login(&app, "king").await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/appointments?status=pending",
        Some(&cookie),
        false,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let uri = format!("/api/appointments/{appointment_id}/approve");
    let (status, body) = send(&app, Method::POST, &uri, Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "confirmed");
    let conversation_id = body["conversationId"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/chat/conversations",
        Some(&cookie),
        false,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["id"], conversation_id.as_str());
    assert_eq!(conversations[0]["lastMessage"], "Appointment confirmed");
    assert_eq!(conversations[0]["unreadCount"], 1);
    assert_eq!(body["unreadTotal"], 1);

    // A second decision on the same appointment is refused.
    let (status, body) = send(&app, Method::POST, &uri, Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    let reject = format!("/api/appointments/{appointment_id}/reject");
    let (status, _) = send(&app, Method::POST, &reject, Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn rejecting_includes_the_reason() {
    let (app, _) = setup().await;
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/intake/appointments",
        None,
        true,
        Some(booking(None, "king Hospital")),
    )
    .await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();
    // No clinicId: the hospital name still routes the request to king Hospital.
    assert_eq!(body["conversation"]["clinicId"], "king");
    assert_eq!(body["conversation"]["unreadCount"], 1);

    let cookie = login(&app, "king").await;
    let uri = format!("/api/appointments/{appointment_id}/reject");
    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&cookie),
        false,
        Some(json!({ "reason": "fully booked" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "rejected");

    let conversation_id = body["conversationId"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/chat/conversations/{conversation_id}/messages"),
        Some(&cookie),
        false,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.last().unwrap()["body"], "Appointment rejected: fully booked");
    assert_eq!(messages.last().unwrap()["kind"], "appointmentCancellation");
}

#[tokio::test]
async fn other_clinics_cannot_decide_an_appointment() {
    let (app, _) = setup().await;
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/intake/appointments",
        None,
        true,
        Some(booking(None, "king Hospital")),
    )
    .await;
    let appointment_id = body["appointment"]["id"].as_str().unwrap().to_string();

    let cookie = login(&app, "city").await;
    let (status, body) = send(&app, Method::GET, "/api/appointments", Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let uri = format!("/api/appointments/{appointment_id}/approve");
    let (status, _) = send(&app, Method::POST, &uri, Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/appointments/missing/approve",
        Some(&cookie),
        false,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_round_trip_and_deletion_by_both_sides() {
    let (app, _) = setup().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/intake/messages",
        None,
        true,
        Some(json!({
            "patientId": "patient-jo",
            "patientName": "Jo Jo",
            "clinicId": "king",
            "body": "Hello, is parking available?"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let conversation_id = body["conversation"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["conversation"]["unreadCount"], 1);

    let cookie = login(&app, "king").await;
    let messages_uri = format!("/api/chat/conversations/{conversation_id}/messages");
    let (status, body) = send(
        &app,
        Method::POST,
        &messages_uri,
        Some(&cookie),
        false,
        Some(json!({ "body": "Yes, behind the building." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conversation"]["lastMessage"], "Yes, behind the building.");
    assert_eq!(body["conversation"]["unreadCount"], 1);

    let read_uri = format!("/api/chat/conversations/{conversation_id}/read");
    for _ in 0..2 {
        let (status, body) = send(&app, Method::POST, &read_uri, Some(&cookie), false, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conversation"]["unreadCount"], 0);
    }

    let (status, _) = send(
        &app,
        Method::POST,
        &messages_uri,
        Some(&cookie),
        false,
        Some(json!({ "body": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let delete_uri = format!("/api/chat/conversations/{conversation_id}");
    let (status, body) = send(&app, Method::DELETE, &delete_uri, Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purged"], false);

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/chat/conversations",
        Some(&cookie),
        false,
        None,
    )
    .await;
    assert!(body["conversations"].as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/intake/conversations/{conversation_id}"),
        None,
        true,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["purged"], true);

    let (status, _) = send(&app, Method::GET, &messages_uri, Some(&cookie), false, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clinics_cannot_read_each_others_conversations() {
    let (app, _) = setup().await;
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/intake/messages",
        None,
        true,
        Some(json!({
            "patientId": "patient-jo",
            "patientName": "Jo Jo",
            "clinicId": "king",
            "body": "Hi"
        })),
    )
    .await;
    let conversation_id = body["conversation"]["id"].as_str().unwrap().to_string();

    let cookie = login(&app, "city").await;
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/chat/conversations/{conversation_id}/messages"),
        Some(&cookie),
        false,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn settings_are_validated() {
    let (app, state) = setup().await;
    let cookie = login(&app, "king").await;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/settings",
        Some(&cookie),
        false,
        Some(json!({ "pollIntervalSecs": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/settings",
        Some(&cookie),
        false,
        Some(json!({ "notificationSound": false, "pollIntervalSecs": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["pollIntervalSecs"], 30);

    let stored = state.store.get_clinic("king").await.unwrap().unwrap();
    assert!(!stored.settings.notification_sound);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/profile",
        Some(&cookie),
        false,
        Some(json!({ "avatarUrl": "file:///etc/passwd" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_uses_the_error_shape() {
    let (app, _) = setup().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unmatched_hospital_name_reaches_no_clinic() {
    let (app, _) = setup().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/intake/appointments",
        None,
        true,
        Some(booking(None, "City General Hospital")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["conversation"].is_null());

    for clinic_id in ["king", "city"] {
        let cookie = login(&app, clinic_id).await;
        let (status, body) =
            send(&app, Method::GET, "/api/appointments", Some(&cookie), false, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }
}

#[tokio::test]
async fn bad_status_filter_uses_the_error_shape() {
    let (app, _) = setup().await;
    let cookie = login(&app, "king").await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/appointments?status=bogus",
        Some(&cookie),
        false,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}
