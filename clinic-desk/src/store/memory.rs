use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    APPOINTMENTS, CLINICS, CONVERSATIONS, DeskStore, MESSAGES, StoreError, StoreResult,
};
use crate::models::{
    Appointment, AppointmentStatus, Clinic, Conversation, Message, SenderRole, SummaryUpdate,
    UnreadChange,
};

#[derive(Default)]
struct Collections {
    conversations: HashMap<String, Conversation>,
    // keyed by conversation id, kept in insertion order
    messages: HashMap<String, Vec<Message>>,
    appointments: HashMap<String, Appointment>,
    clinics: HashMap<String, Clinic>,
}

/// In-process document store. One lock covers every collection so the
/// multi-document operations of [`DeskStore`] are atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeskStore for MemoryStore {
    async fn find_conversation(
        &self,
        patient_id: &str,
        clinic_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .values()
            .find(|c| c.patient_id == patient_id && c.clinic_id == clinic_id)
            .cloned())
    }

    async fn get_conversation(&self, id: &str) -> StoreResult<Option<Conversation>> {
        Ok(self.inner.read().await.conversations.get(id).cloned())
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.conversations.contains_key(&conversation.id) {
            return Err(StoreError::Duplicate {
                collection: CONVERSATIONS,
                id: conversation.id.clone(),
            });
        }
        inner
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn append_message(
        &self,
        message: &Message,
        update: &SummaryUpdate,
    ) -> StoreResult<Option<Conversation>> {
        let mut inner = self.inner.write().await;

        let already_stored = inner
            .messages
            .get(&message.conversation_id)
            .is_some_and(|msgs| msgs.iter().any(|m| m.id == message.id));
        if already_stored {
            return Err(StoreError::Duplicate {
                collection: MESSAGES,
                id: message.id.clone(),
            });
        }

        let Some(conversation) = inner.conversations.get_mut(&message.conversation_id) else {
            return Ok(None);
        };

        conversation.last_message = update.last_message.clone();
        conversation.last_message_time = update.last_message_time;
        conversation.last_sender_role = Some(update.sender_role);
        if update.unread == UnreadChange::Increment {
            conversation.unread_count = conversation.unread_count.saturating_add(1);
        }
        conversation.deleted_by_patient = false;
        conversation.deleted_by_clinic = false;
        let updated = conversation.clone();

        inner
            .messages
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());

        Ok(Some(updated))
    }

    async fn reset_unread(&self, id: &str) -> StoreResult<Option<Conversation>> {
        let mut inner = self.inner.write().await;
        Ok(inner.conversations.get_mut(id).map(|c| {
            c.unread_count = 0;
            c.clone()
        }))
    }

    async fn set_hidden(&self, id: &str, party: SenderRole) -> StoreResult<Option<Conversation>> {
        let mut inner = self.inner.write().await;
        Ok(inner.conversations.get_mut(id).map(|c| {
            match party {
                SenderRole::Patient => c.deleted_by_patient = true,
                SenderRole::Clinic => c.deleted_by_clinic = true,
            }
            c.clone()
        }))
    }

    async fn purge_conversation(&self, id: &str) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        inner.conversations.remove(id);
        let removed = inner.messages.remove(id).map(|m| m.len()).unwrap_or(0);
        Ok(removed as u64)
    }

    async fn conversations_for_clinic(&self, clinic_id: &str) -> StoreResult<Vec<Conversation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .values()
            .filter(|c| c.clinic_id == clinic_id && !c.deleted_by_clinic)
            .cloned()
            .collect())
    }

    async fn messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_messages_read(
        &self,
        conversation_id: &str,
        sender_role: SenderRole,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        if let Some(messages) = inner.messages.get_mut(conversation_id) {
            for message in messages
                .iter_mut()
                .filter(|m| m.sender_role == sender_role && !m.read)
            {
                message.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.appointments.contains_key(&appointment.id) {
            return Err(StoreError::Duplicate {
                collection: APPOINTMENTS,
                id: appointment.id.clone(),
            });
        }
        inner
            .appointments
            .insert(appointment.id.clone(), appointment.clone());
        Ok(())
    }

    async fn get_appointment(&self, id: &str) -> StoreResult<Option<Appointment>> {
        Ok(self.inner.read().await.appointments.get(id).cloned())
    }

    async fn appointments_for_clinic(&self, clinic: &Clinic) -> StoreResult<Vec<Appointment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .appointments
            .values()
            .filter(|a| a.belongs_to(clinic))
            .cloned()
            .collect())
    }

    async fn transition_appointment(
        &self,
        id: &str,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Appointment>> {
        let mut inner = self.inner.write().await;
        match inner.appointments.get_mut(id) {
            Some(appointment) if appointment.status == from => {
                appointment.status = to;
                appointment.updated_at = Some(at);
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_clinic(&self, clinic: &Clinic) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.clinics.contains_key(&clinic.id) {
            return Err(StoreError::Duplicate {
                collection: CLINICS,
                id: clinic.id.clone(),
            });
        }
        inner.clinics.insert(clinic.id.clone(), clinic.clone());
        Ok(())
    }

    async fn get_clinic(&self, id: &str) -> StoreResult<Option<Clinic>> {
        Ok(self.inner.read().await.clinics.get(id).cloned())
    }

    async fn find_clinic_by_name(&self, name: &str) -> StoreResult<Option<Clinic>> {
        let inner = self.inner.read().await;
        Ok(inner.clinics.values().find(|c| c.name == name).cloned())
    }

    async fn update_clinic(&self, clinic: &Clinic) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.clinics.insert(clinic.id.clone(), clinic.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;

    fn conversation(id: &str) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: id.to_string(),
            patient_id: "p1".to_string(),
            clinic_id: "c1".to_string(),
            patient_name: "Jo Jo".to_string(),
            patient_avatar_url: None,
            clinic_name: "king Hospital".to_string(),
            clinic_avatar_url: None,
            last_message: "New conversation".to_string(),
            last_message_time: now,
            unread_count: 1,
            last_sender_role: None,
            deleted_by_patient: false,
            deleted_by_clinic: false,
            created_at: now,
        }
    }

    fn message(id: &str, conversation_id: &str, role: SenderRole) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: "p1".to_string(),
            sender_role: role,
            body: "hello".to_string(),
            kind: MessageKind::Text,
            created_at: Utc::now(),
            read: false,
        }
    }

    #[tokio::test]
    async fn append_to_missing_conversation_writes_nothing() {
        let store = MemoryStore::new();
        let msg = message("m1", "ghost", SenderRole::Patient);
        let result = store
            .append_message(&msg, &SummaryUpdate::for_message(&msg))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.messages("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_message_ids_are_rejected() {
        let store = MemoryStore::new();
        store.insert_conversation(&conversation("c")).await.unwrap();
        let msg = message("m1", "c", SenderRole::Patient);
        let update = SummaryUpdate::for_message(&msg);
        store.append_message(&msg, &update).await.unwrap();
        let err = store.append_message(&msg, &update).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert_eq!(store.get_conversation("c").await.unwrap().unwrap().unread_count, 2);
    }

    #[tokio::test]
    async fn purge_removes_messages_too() {
        let store = MemoryStore::new();
        store.insert_conversation(&conversation("c")).await.unwrap();
        for id in ["m1", "m2"] {
            let msg = message(id, "c", SenderRole::Clinic);
            store
                .append_message(&msg, &SummaryUpdate::for_message(&msg))
                .await
                .unwrap();
        }
        assert_eq!(store.purge_conversation("c").await.unwrap(), 2);
        assert!(store.get_conversation("c").await.unwrap().is_none());
        assert!(store.messages("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transition_only_fires_from_expected_status() {
        let store = MemoryStore::new();
        let appointment = Appointment {
            id: "a1".to_string(),
            patient_id: "p1".to_string(),
            patient_name: "Jo Jo".to_string(),
            clinic_id: Some("c1".to_string()),
            hospital: "king Hospital".to_string(),
            department: "Dental".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            status: AppointmentStatus::Pending,
            reason: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        store.insert_appointment(&appointment).await.unwrap();

        let first = store
            .transition_appointment(
                "a1",
                AppointmentStatus::Pending,
                AppointmentStatus::Confirmed,
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(first.unwrap().status, AppointmentStatus::Confirmed);

        let second = store
            .transition_appointment(
                "a1",
                AppointmentStatus::Pending,
                AppointmentStatus::Rejected,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(second.is_none());
    }
}
