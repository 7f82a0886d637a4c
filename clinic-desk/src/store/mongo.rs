use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::{
    Client, Collection, Database,
    bson::{Bson, Document, doc},
    options::ReturnDocument,
};
use tracing::debug;

use super::{
    APPOINTMENTS, CLINICS, CONVERSATIONS, DeskStore, MESSAGES, StoreResult,
};
use crate::models::{
    Appointment, AppointmentStatus, Clinic, Conversation, Message, SenderRole, SummaryUpdate,
    UnreadChange,
};

pub struct MongoDbConfig {
    pub connection_url: String,
    pub database_name: String,
}

impl MongoDbConfig {
    pub fn new(connection_url: impl Into<String>) -> Self {
        Self {
            connection_url: connection_url.into(),
            database_name: "clinic_desk".to_string(),
        }
    }

    pub fn with_database_name(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = database_name.into();
        self
    }
}

/// MongoDB-backed store. Multi-document writes run inside a transaction,
/// so the deployment must be a replica set.
pub struct MongoStore {
    client: Client,
    db: Database,
}

fn timestamp(at: &DateTime<Utc>) -> Bson {
    Bson::String(at.to_rfc3339())
}

fn hidden_field(party: SenderRole) -> &'static str {
    match party {
        SenderRole::Patient => "deletedByPatient",
        SenderRole::Clinic => "deletedByClinic",
    }
}

fn role_value(role: SenderRole) -> &'static str {
    match role {
        SenderRole::Patient => "patient",
        SenderRole::Clinic => "clinic",
    }
}

impl MongoStore {
    pub async fn connect(config: &MongoDbConfig) -> StoreResult<Self> {
        let client = Client::with_uri_str(&config.connection_url).await?;
        let db = client.database(&config.database_name);
        debug!(database = %config.database_name, "connected to mongodb");
        Ok(Self { client, db })
    }

    fn conversations(&self) -> Collection<Conversation> {
        self.db.collection(CONVERSATIONS)
    }

    fn messages_col(&self) -> Collection<Message> {
        self.db.collection(MESSAGES)
    }

    fn appointments(&self) -> Collection<Appointment> {
        self.db.collection(APPOINTMENTS)
    }

    fn clinics(&self) -> Collection<Clinic> {
        self.db.collection(CLINICS)
    }

    async fn update_conversation(
        &self,
        id: &str,
        update: Document,
    ) -> StoreResult<Option<Conversation>> {
        Ok(self
            .conversations()
            .find_one_and_update(doc! { "id": id }, update)
            .return_document(ReturnDocument::After)
            .await?)
    }
}

#[async_trait]
impl DeskStore for MongoStore {
    async fn find_conversation(
        &self,
        patient_id: &str,
        clinic_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        Ok(self
            .conversations()
            .find_one(doc! { "patientId": patient_id, "clinicId": clinic_id })
            .await?)
    }

    async fn get_conversation(&self, id: &str) -> StoreResult<Option<Conversation>> {
        Ok(self.conversations().find_one(doc! { "id": id }).await?)
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        self.conversations().insert_one(conversation).await?;
        Ok(())
    }

    async fn append_message(
        &self,
        message: &Message,
        update: &SummaryUpdate,
    ) -> StoreResult<Option<Conversation>> {
        let mut set = doc! {
            "$set": {
                "lastMessage": &update.last_message,
                "lastMessageTime": timestamp(&update.last_message_time),
                "lastSenderRole": role_value(update.sender_role),
                "deletedByPatient": false,
                "deletedByClinic": false,
            }
        };
        if update.unread == UnreadChange::Increment {
            set.insert("$inc", doc! { "unreadCount": 1_i64 });
        }

        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        let conversation = self
            .conversations()
            .find_one_and_update(doc! { "id": &message.conversation_id }, set)
            .return_document(ReturnDocument::After)
            .session(&mut session)
            .await?;

        if conversation.is_none() {
            session.abort_transaction().await?;
            return Ok(None);
        }

        self.messages_col()
            .insert_one(message)
            .session(&mut session)
            .await?;

        session.commit_transaction().await?;

        Ok(conversation)
    }

    async fn reset_unread(&self, id: &str) -> StoreResult<Option<Conversation>> {
        self.update_conversation(id, doc! { "$set": { "unreadCount": 0_i64 } })
            .await
    }

    async fn set_hidden(&self, id: &str, party: SenderRole) -> StoreResult<Option<Conversation>> {
        let mut fields = Document::new();
        fields.insert(hidden_field(party), true);
        self.update_conversation(id, doc! { "$set": fields }).await
    }

    async fn purge_conversation(&self, id: &str) -> StoreResult<u64> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        self.conversations()
            .delete_one(doc! { "id": id })
            .session(&mut session)
            .await?;
        let removed = self
            .messages_col()
            .delete_many(doc! { "conversationId": id })
            .session(&mut session)
            .await?;

        session.commit_transaction().await?;

        Ok(removed.deleted_count)
    }

    async fn conversations_for_clinic(&self, clinic_id: &str) -> StoreResult<Vec<Conversation>> {
        let cursor = self
            .conversations()
            .find(doc! { "clinicId": clinic_id, "deletedByClinic": { "$ne": true } })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>> {
        let cursor = self
            .messages_col()
            .find(doc! { "conversationId": conversation_id })
            .await?;
        let mut messages: Vec<Message> = cursor.try_collect().await?;
        // timestamps are stored as strings, so order on the parsed value
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn mark_messages_read(
        &self,
        conversation_id: &str,
        sender_role: SenderRole,
    ) -> StoreResult<u64> {
        let result = self
            .messages_col()
            .update_many(
                doc! {
                    "conversationId": conversation_id,
                    "senderRole": role_value(sender_role),
                    "read": false,
                },
                doc! { "$set": { "read": true } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<()> {
        self.appointments().insert_one(appointment).await?;
        Ok(())
    }

    async fn get_appointment(&self, id: &str) -> StoreResult<Option<Appointment>> {
        Ok(self.appointments().find_one(doc! { "id": id }).await?)
    }

    async fn appointments_for_clinic(&self, clinic: &Clinic) -> StoreResult<Vec<Appointment>> {
        let filter = doc! {
            "$or": [
                { "clinicId": &clinic.id },
                { "clinicId": Bson::Null, "hospital": &clinic.name },
            ]
        };
        let cursor = self.appointments().find(filter).await?;
        let appointments: Vec<Appointment> = cursor.try_collect().await?;
        Ok(appointments
            .into_iter()
            .filter(|a| a.belongs_to(clinic))
            .collect())
    }

    async fn transition_appointment(
        &self,
        id: &str,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Appointment>> {
        Ok(self
            .appointments()
            .find_one_and_update(
                doc! { "id": id, "status": from.as_str() },
                doc! { "$set": { "status": to.as_str(), "updatedAt": timestamp(&at) } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn insert_clinic(&self, clinic: &Clinic) -> StoreResult<()> {
        self.clinics().insert_one(clinic).await?;
        Ok(())
    }

    async fn get_clinic(&self, id: &str) -> StoreResult<Option<Clinic>> {
        Ok(self.clinics().find_one(doc! { "id": id }).await?)
    }

    async fn find_clinic_by_name(&self, name: &str) -> StoreResult<Option<Clinic>> {
        Ok(self.clinics().find_one(doc! { "name": name }).await?)
    }

    async fn update_clinic(&self, clinic: &Clinic) -> StoreResult<()> {
        self.clinics()
            .replace_one(doc! { "id": &clinic.id }, clinic)
            .await?;
        Ok(())
    }
}
