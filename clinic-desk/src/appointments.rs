use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    conversations::ConversationStore,
    error::{DeskError, DeskResult},
    metrics::Metrics,
    models::{
        Appointment, AppointmentStatus, Clinic, Conversation, DisplayNames, Message, MessageKind,
        SenderRole,
    },
    store::DeskStore,
};

pub const CONFIRMED_MESSAGE: &str = "Appointment confirmed";
pub const REJECTED_MESSAGE: &str = "Appointment rejected";

/// Appointment as submitted by the patient-facing system.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub patient_avatar_url: Option<String>,
    #[serde(default)]
    pub clinic_id: Option<String>,
    pub hospital: String,
    pub department: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentOutcome {
    pub appointment: Appointment,
    pub conversation: Option<Conversation>,
    pub message: Option<Message>,
}

#[derive(Clone, Copy, Debug)]
enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn label(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }

    fn target(&self) -> AppointmentStatus {
        match self {
            Decision::Approve => AppointmentStatus::Confirmed,
            Decision::Reject => AppointmentStatus::Rejected,
        }
    }

    fn message_kind(&self) -> MessageKind {
        match self {
            Decision::Approve => MessageKind::AppointmentConfirmation,
            Decision::Reject => MessageKind::AppointmentCancellation,
        }
    }
}

#[derive(Clone)]
pub struct AppointmentDesk {
    store: Arc<dyn DeskStore>,
    conversations: ConversationStore,
}

impl AppointmentDesk {
    pub fn new(store: Arc<dyn DeskStore>, conversations: ConversationStore) -> Self {
        Self {
            store,
            conversations,
        }
    }

    /// Appointments matched to `clinic`, most recently created first.
    pub async fn list_for_clinic(
        &self,
        clinic: &Clinic,
        status: Option<AppointmentStatus>,
    ) -> DeskResult<Vec<Appointment>> {
        let mut appointments = self.store.appointments_for_clinic(clinic).await?;
        if let Some(status) = status {
            appointments.retain(|a| a.status == status);
        }
        appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(appointments)
    }

    pub async fn approve(&self, clinic: &Clinic, id: &str) -> DeskResult<AppointmentOutcome> {
        self.decide(clinic, id, Decision::Approve, CONFIRMED_MESSAGE.to_string())
            .await
    }

    pub async fn reject(
        &self,
        clinic: &Clinic,
        id: &str,
        reason: Option<&str>,
    ) -> DeskResult<AppointmentOutcome> {
        let body = match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => format!("{REJECTED_MESSAGE}: {reason}"),
            None => REJECTED_MESSAGE.to_string(),
        };
        self.decide(clinic, id, Decision::Reject, body).await
    }

    async fn decide(
        &self,
        clinic: &Clinic,
        id: &str,
        decision: Decision,
        body: String,
    ) -> DeskResult<AppointmentOutcome> {
        let appointment = self
            .store
            .get_appointment(id)
            .await?
            .ok_or(DeskError::NotFound("appointment"))?;

        if !appointment.belongs_to(clinic) {
            warn!(
                appointment_id = id,
                clinic_id = %clinic.id,
                hospital = %appointment.hospital,
                "appointment does not belong to clinic"
            );
            Metrics::appointment_decided(decision.label(), "forbidden");
            return Err(DeskError::Forbidden(
                "appointment belongs to a different clinic".into(),
            ));
        }

        let Some(appointment) = self
            .store
            .transition_appointment(id, AppointmentStatus::Pending, decision.target(), Utc::now())
            .await?
        else {
            Metrics::appointment_decided(decision.label(), "conflict");
            let current = self
                .store
                .get_appointment(id)
                .await?
                .map(|a| a.status.as_str())
                .unwrap_or("removed");
            return Err(DeskError::Conflict(format!("appointment is already {current}")));
        };

        let names = DisplayNames {
            patient_name: appointment.patient_name.clone(),
            patient_avatar_url: None,
            clinic_name: clinic.name.clone(),
            clinic_avatar_url: clinic.avatar_url.clone(),
        };
        let opened = self
            .conversations
            .open_with_message(
                &appointment.patient_id,
                &clinic.id,
                &names,
                &clinic.id,
                SenderRole::Clinic,
                &body,
                decision.message_kind(),
            )
            .await;
        let (message, conversation) = match opened {
            Ok(pair) => pair,
            Err(e) => {
                // A decision without its message must stay retryable.
                let restored = self
                    .store
                    .transition_appointment(
                        id,
                        decision.target(),
                        AppointmentStatus::Pending,
                        Utc::now(),
                    )
                    .await;
                if let Err(restore_err) = restored {
                    error!(
                        appointment_id = id,
                        error = %restore_err,
                        "failed to return appointment to pending"
                    );
                }
                Metrics::appointment_decided(decision.label(), "failed");
                return Err(e);
            }
        };

        Metrics::appointment_decided(decision.label(), "applied");
        info!(
            appointment_id = id,
            clinic_id = %clinic.id,
            status = appointment.status.as_str(),
            conversation_id = %conversation.id,
            "appointment decided"
        );

        Ok(AppointmentOutcome {
            appointment,
            conversation: Some(conversation),
            message: Some(message),
        })
    }

    /// Records a pending appointment from the patient system. When the
    /// appointment names a known clinic, the request is also posted into the
    /// patient's conversation with that clinic.
    pub async fn book(&self, request: NewAppointment) -> DeskResult<AppointmentOutcome> {
        for (field, value) in [
            ("patientId", &request.patient_id),
            ("patientName", &request.patient_name),
            ("hospital", &request.hospital),
            ("department", &request.department),
        ] {
            if value.trim().is_empty() {
                return Err(DeskError::Validation(format!("{field} is required")));
            }
        }

        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            patient_id: request.patient_id,
            patient_name: request.patient_name,
            clinic_id: request.clinic_id,
            hospital: request.hospital,
            department: request.department,
            date: request.date,
            time: request.time,
            status: AppointmentStatus::Pending,
            reason: request.reason,
            notes: request.notes,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.store.insert_appointment(&appointment).await?;
        info!(appointment_id = %appointment.id, hospital = %appointment.hospital, "appointment booked");

        // Same rule as `Appointment::belongs_to`: id first, exact name otherwise.
        let clinic = match &appointment.clinic_id {
            Some(clinic_id) => self.store.get_clinic(clinic_id).await?,
            None => self.store.find_clinic_by_name(&appointment.hospital).await?,
        };
        let Some(clinic) = clinic else {
            return Ok(AppointmentOutcome {
                appointment,
                conversation: None,
                message: None,
            });
        };

        let names = DisplayNames {
            patient_name: appointment.patient_name.clone(),
            patient_avatar_url: request.patient_avatar_url,
            clinic_name: clinic.name.clone(),
            clinic_avatar_url: clinic.avatar_url.clone(),
        };
        let body = format!(
            "Appointment request: {} on {} at {}",
            appointment.department,
            appointment.date,
            appointment.time.format("%H:%M")
        );
        let (message, conversation) = self
            .conversations
            .open_with_message(
                &appointment.patient_id,
                &clinic.id,
                &names,
                &appointment.patient_id,
                SenderRole::Patient,
                &body,
                MessageKind::AppointmentRequest,
            )
            .await?;

        Ok(AppointmentOutcome {
            appointment,
            conversation: Some(conversation),
            message: Some(message),
        })
    }
}
