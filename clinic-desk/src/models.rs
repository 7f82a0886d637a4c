use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

pub const LAST_MESSAGE_MAX_CHARS: usize = 100;
pub const NEW_CONVERSATION_PLACEHOLDER: &str = "New conversation";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SenderRole {
    Patient,
    Clinic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Text,
    AppointmentRequest,
    AppointmentConfirmation,
    AppointmentCancellation,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::AppointmentRequest => "appointmentRequest",
            MessageKind::AppointmentConfirmation => "appointmentConfirmation",
            MessageKind::AppointmentCancellation => "appointmentCancellation",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub patient_id: String,
    pub clinic_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub patient_avatar_url: Option<String>,
    pub clinic_name: String,
    #[serde(default)]
    pub clinic_avatar_url: Option<String>,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    pub unread_count: u32,
    /// Author of the latest message; `None` until the first one lands.
    #[serde(default)]
    pub last_sender_role: Option<SenderRole>,
    #[serde(default)]
    pub deleted_by_patient: bool,
    #[serde(default)]
    pub deleted_by_clinic: bool,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn hidden_from(&self, party: SenderRole) -> bool {
        match party {
            SenderRole::Patient => self.deleted_by_patient,
            SenderRole::Clinic => self.deleted_by_clinic,
        }
    }
}

/// Display names copied onto a conversation when it is first created.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNames {
    pub patient_name: String,
    #[serde(default)]
    pub patient_avatar_url: Option<String>,
    pub clinic_name: String,
    #[serde(default)]
    pub clinic_avatar_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub sender_role: SenderRole,
    pub body: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// How a new message moves the parent conversation's unread counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnreadChange {
    Increment,
    Keep,
}

impl From<SenderRole> for UnreadChange {
    fn from(role: SenderRole) -> Self {
        match role {
            SenderRole::Patient => UnreadChange::Increment,
            SenderRole::Clinic => UnreadChange::Keep,
        }
    }
}

/// Denormalized fields written onto a conversation after a message lands.
#[derive(Clone, Debug)]
pub struct SummaryUpdate {
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    pub sender_role: SenderRole,
    pub unread: UnreadChange,
}

impl SummaryUpdate {
    pub fn for_message(message: &Message) -> Self {
        Self {
            last_message: truncate_preview(&message.body),
            last_message_time: message.created_at,
            sender_role: message.sender_role,
            unread: message.sender_role.into(),
        }
    }
}

pub fn truncate_preview(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= LAST_MESSAGE_MAX_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(LAST_MESSAGE_MAX_CHARS).collect();
    format!("{}...", cut.trim_end())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Rejected => "rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub clinic_id: Option<String>,
    pub hospital: String,
    pub department: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    /// Prefers the clinic id when the patient system recorded one and falls
    /// back to exact equality between `hospital` and the clinic's name.
    pub fn belongs_to(&self, clinic: &Clinic) -> bool {
        match &self.clinic_id {
            Some(clinic_id) => clinic_id == &clinic.id,
            None => self.hospital == clinic.name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicSettings {
    pub notification_sound: bool,
    pub poll_interval_secs: u32,
}

impl Default for ClinicSettings {
    fn default() -> Self {
        Self {
            notification_sound: true,
            poll_interval_secs: 15,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub certificate_url: Option<String>,
    pub api_key: String,
    #[serde(default)]
    pub settings: ClinicSettings,
}

/// What the dashboard shows about a clinic; never carries the api key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub certificate_url: Option<String>,
}

impl From<&Clinic> for ClinicProfile {
    fn from(clinic: &Clinic) -> Self {
        Self {
            id: clinic.id.clone(),
            name: clinic.name.clone(),
            email: clinic.email.clone(),
            avatar_url: clinic.avatar_url.clone(),
            certificate_url: clinic.certificate_url.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub certificate_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub notification_sound: Option<bool>,
    pub poll_interval_secs: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clinic(id: &str, name: &str) -> Clinic {
        Clinic {
            id: id.to_string(),
            name: name.to_string(),
            email: "desk@example.org".to_string(),
            avatar_url: None,
            certificate_url: None,
            api_key: "key".to_string(),
            settings: ClinicSettings::default(),
        }
    }

    fn appointment(clinic_id: Option<&str>, hospital: &str) -> Appointment {
        Appointment {
            id: "a1".to_string(),
            patient_id: "p1".to_string(),
            patient_name: "Jo Jo".to_string(),
            clinic_id: clinic_id.map(str::to_string),
            hospital: hospital.to_string(),
            department: "Dental".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            status: AppointmentStatus::Pending,
            reason: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn short_bodies_are_kept_whole() {
        assert_eq!(truncate_preview("  Appointment confirmed "), "Appointment confirmed");
    }

    #[test]
    fn long_bodies_are_cut_on_char_boundaries() {
        let body = "é".repeat(150);
        let preview = truncate_preview(&body);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), LAST_MESSAGE_MAX_CHARS + 3);
    }

    #[test]
    fn appointment_matching_prefers_clinic_id() {
        let king = clinic("c1", "king Hospital");
        assert!(appointment(Some("c1"), "renamed Hospital").belongs_to(&king));
        assert!(!appointment(Some("c2"), "king Hospital").belongs_to(&king));
    }

    #[test]
    fn appointment_matching_falls_back_to_exact_name() {
        let king = clinic("c1", "king Hospital");
        assert!(appointment(None, "king Hospital").belongs_to(&king));
        assert!(!appointment(None, "King Hospital").belongs_to(&king));
        assert!(!appointment(None, "City General Hospital").belongs_to(&king));
    }

    #[test]
    fn kinds_serialize_in_camel_case() {
        let json = serde_json::to_string(&MessageKind::AppointmentConfirmation).unwrap();
        assert_eq!(json, "\"appointmentConfirmation\"");
        assert_eq!(MessageKind::AppointmentConfirmation.as_str(), "appointmentConfirmation");
    }
}
