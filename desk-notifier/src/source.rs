use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_desk::models::{
    Appointment, AppointmentStatus, ClinicSettings, Conversation, SenderRole,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info};

use crate::error::PollError;

/// One row of a polled feed, reduced to what the notifier needs.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub eligible: bool,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Result<Vec<FeedItem>, PollError>;
}

/// HTTP client for the desk's dashboard API. Keeps the session cookie and
/// logs in again whenever the desk answers 401.
pub struct DeskClient {
    http: Client,
    base_url: String,
    clinic_id: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ConversationsResponse {
    conversations: Vec<Conversation>,
}

#[derive(Deserialize)]
struct AppointmentsResponse {
    appointments: Vec<Appointment>,
}

#[derive(Deserialize)]
struct SettingsResponse {
    settings: ClinicSettings,
}

impl DeskClient {
    pub fn new(
        base_url: &str,
        clinic_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, PollError> {
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            clinic_id: clinic_id.into(),
            api_key: api_key.into(),
        })
    }

    pub async fn login(&self) -> Result<(), PollError> {
        let path = "/api/auth/login";
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&json!({ "clinicId": self.clinic_id, "apiKey": self.api_key }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PollError::Status {
                status: resp.status().as_u16(),
                path: path.to_string(),
            });
        }
        info!(clinic_id = %self.clinic_id, "notifier logged in to desk");
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), PollError> {
        let path = "/api/auth/logout";
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PollError::Status {
                status: resp.status().as_u16(),
                path: path.to_string(),
            });
        }
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, PollError> {
        let url = format!("{}{}", self.base_url, path);
        let mut resp = self.http.get(&url).send().await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "session missing or expired, logging in again");
            self.login().await?;
            resp = self.http.get(&url).send().await?;
        }

        if !resp.status().is_success() {
            return Err(PollError::Status {
                status: resp.status().as_u16(),
                path: path.to_string(),
            });
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, PollError> {
        let body: ConversationsResponse = self.get_json("/api/chat/conversations").await?;
        Ok(body.conversations)
    }

    pub async fn appointments(&self) -> Result<Vec<Appointment>, PollError> {
        let body: AppointmentsResponse = self.get_json("/api/appointments").await?;
        Ok(body.appointments)
    }

    /// Notification preferences stored on the clinic's profile.
    pub async fn settings(&self) -> Result<ClinicSettings, PollError> {
        let body: SettingsResponse = self.get_json("/api/settings").await?;
        Ok(body.settings)
    }
}

pub fn conversation_item(conversation: &Conversation) -> FeedItem {
    FeedItem {
        id: conversation.id.clone(),
        timestamp: conversation.last_message_time,
        title: format!("New message from {}", conversation.patient_name),
        body: conversation.last_message.clone(),
        // The clinic's own replies and decisions never notify the clinic.
        eligible: conversation.unread_count > 0
            && conversation.last_sender_role != Some(SenderRole::Clinic),
    }
}

pub fn appointment_item(appointment: &Appointment) -> FeedItem {
    FeedItem {
        id: appointment.id.clone(),
        timestamp: appointment.created_at,
        title: "New appointment request".to_string(),
        body: format!(
            "{}: {} on {} at {}",
            appointment.patient_name,
            appointment.department,
            appointment.date,
            appointment.time.format("%H:%M")
        ),
        eligible: appointment.status == AppointmentStatus::Pending,
    }
}

pub struct ChatFeed {
    client: Arc<DeskClient>,
}

impl ChatFeed {
    pub fn new(client: Arc<DeskClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedSource for ChatFeed {
    fn name(&self) -> &'static str {
        "chat"
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>, PollError> {
        let conversations = self.client.conversations().await?;
        Ok(conversations.iter().map(conversation_item).collect())
    }
}

pub struct AppointmentFeed {
    client: Arc<DeskClient>,
}

impl AppointmentFeed {
    pub fn new(client: Arc<DeskClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedSource for AppointmentFeed {
    fn name(&self) -> &'static str {
        "appointments"
    }

    async fn fetch(&self) -> Result<Vec<FeedItem>, PollError> {
        let appointments = self.client.appointments().await?;
        Ok(appointments.iter().map(appointment_item).collect())
    }
}
