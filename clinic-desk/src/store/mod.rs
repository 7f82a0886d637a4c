//! Document store seam.
//!
//! The dashboard only ever talks to its collections (`chat_conversations`,
//! `chat_messages`, `appointments`, `clinics`) through [`DeskStore`]. Every
//! method that has to change two documents together, or change one document
//! conditionally, is a single call so the implementation can make it atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Appointment, AppointmentStatus, Clinic, Conversation, Message, SenderRole, SummaryUpdate,
};

pub mod memory;
#[cfg(feature = "mongo_db")]
pub mod mongo;

pub use memory::MemoryStore;
#[cfg(feature = "mongo_db")]
pub use mongo::{MongoDbConfig, MongoStore};

pub const CONVERSATIONS: &str = "chat_conversations";
pub const MESSAGES: &str = "chat_messages";
pub const APPOINTMENTS: &str = "appointments";
pub const CLINICS: &str = "clinics";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {id} already exists in {collection}")]
    Duplicate { collection: &'static str, id: String },
    #[cfg(feature = "mongo_db")]
    #[error("mongodb: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

#[async_trait]
pub trait DeskStore: Send + Sync {
    async fn find_conversation(
        &self,
        patient_id: &str,
        clinic_id: &str,
    ) -> StoreResult<Option<Conversation>>;

    async fn get_conversation(&self, id: &str) -> StoreResult<Option<Conversation>>;

    async fn insert_conversation(&self, conversation: &Conversation) -> StoreResult<()>;

    /// Inserts `message` and applies `update` to its conversation as one unit.
    /// Returns `None` without writing anything when the conversation is gone.
    async fn append_message(
        &self,
        message: &Message,
        update: &SummaryUpdate,
    ) -> StoreResult<Option<Conversation>>;

    async fn reset_unread(&self, id: &str) -> StoreResult<Option<Conversation>>;

    /// Sets the deletion flag of `party` and returns the conversation as stored afterwards.
    async fn set_hidden(&self, id: &str, party: SenderRole) -> StoreResult<Option<Conversation>>;

    /// Removes the conversation and every message in it. Returns the number of messages removed.
    async fn purge_conversation(&self, id: &str) -> StoreResult<u64>;

    /// Conversations of a clinic that the clinic has not hidden.
    async fn conversations_for_clinic(&self, clinic_id: &str) -> StoreResult<Vec<Conversation>>;

    /// Messages of a conversation, oldest first.
    async fn messages(&self, conversation_id: &str) -> StoreResult<Vec<Message>>;

    /// Flags every message sent by `sender_role` as read. Returns how many changed.
    async fn mark_messages_read(
        &self,
        conversation_id: &str,
        sender_role: SenderRole,
    ) -> StoreResult<u64>;

    async fn insert_appointment(&self, appointment: &Appointment) -> StoreResult<()>;

    async fn get_appointment(&self, id: &str) -> StoreResult<Option<Appointment>>;

    async fn appointments_for_clinic(&self, clinic: &Clinic) -> StoreResult<Vec<Appointment>>;

    /// Moves an appointment from `from` to `to` only if it is still in `from`.
    /// Returns `None` when the appointment is missing or already left `from`.
    async fn transition_appointment(
        &self,
        id: &str,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Appointment>>;

    async fn insert_clinic(&self, clinic: &Clinic) -> StoreResult<()>;

    async fn get_clinic(&self, id: &str) -> StoreResult<Option<Clinic>>;

    /// Clinic whose display name equals `name` exactly.
    async fn find_clinic_by_name(&self, name: &str) -> StoreResult<Option<Clinic>>;

    async fn update_clinic(&self, clinic: &Clinic) -> StoreResult<()>;
}
