//! Conversation synchronization.
//!
//! Every route that touches `chat_conversations` or `chat_messages` goes
//! through [`ConversationStore`], so one unread policy holds everywhere:
//!
//! * a patient message increments `unreadCount` by one;
//! * a clinic message leaves it unchanged;
//! * only the clinic reading the thread lowers it, and always to zero.
//!
//! A freshly created conversation starts at one unread item standing for the
//! contact that opened it.

use std::{sync::Arc, time::Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{DeskError, DeskResult},
    metrics::Metrics,
    models::{
        Conversation, DisplayNames, Message, MessageKind, NEW_CONVERSATION_PLACEHOLDER,
        SenderRole, SummaryUpdate, UnreadChange,
    },
    store::DeskStore,
};

pub const MAX_BODY_CHARS: usize = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeleteOutcome {
    /// Hidden from one party; the other still sees it.
    Hidden,
    /// Both parties deleted it; conversation and messages are gone.
    Purged,
}

#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<dyn DeskStore>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn DeskStore>) -> Self {
        Self { store }
    }

    /// Returns the conversation for the pair, creating it when missing.
    ///
    /// This is query-then-insert: two first messages racing for the same pair
    /// can each create a conversation.
    pub async fn find_or_create(
        &self,
        patient_id: &str,
        clinic_id: &str,
        names: &DisplayNames,
    ) -> DeskResult<Conversation> {
        self.locate(patient_id, clinic_id, names)
            .await
            .map(|(conversation, _)| conversation)
    }

    /// Find-or-create followed by an append. When the conversation is created
    /// here, `message` is the contact that opened it and already accounts for
    /// the initial unread item, so the counter stays at one.
    #[allow(clippy::too_many_arguments)]
    pub async fn open_with_message(
        &self,
        patient_id: &str,
        clinic_id: &str,
        names: &DisplayNames,
        sender_id: &str,
        role: SenderRole,
        body: &str,
        kind: MessageKind,
    ) -> DeskResult<(Message, Conversation)> {
        let body = validate_body(body)?;
        let (conversation, created) = self.locate(patient_id, clinic_id, names).await?;
        let unread = if created {
            UnreadChange::Keep
        } else {
            role.into()
        };
        self.append(&conversation.id, sender_id, role, body, kind, unread)
            .await
    }

    async fn locate(
        &self,
        patient_id: &str,
        clinic_id: &str,
        names: &DisplayNames,
    ) -> DeskResult<(Conversation, bool)> {
        let start = Instant::now();
        let existing = self.store.find_conversation(patient_id, clinic_id).await?;
        Metrics::observe_db_query("find_conversation", start.elapsed());

        if let Some(conversation) = existing {
            return Ok((conversation, false));
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            clinic_id: clinic_id.to_string(),
            patient_name: names.patient_name.clone(),
            patient_avatar_url: names.patient_avatar_url.clone(),
            clinic_name: names.clinic_name.clone(),
            clinic_avatar_url: names.clinic_avatar_url.clone(),
            last_message: NEW_CONVERSATION_PLACEHOLDER.to_string(),
            last_message_time: now,
            unread_count: 1,
            last_sender_role: None,
            deleted_by_patient: false,
            deleted_by_clinic: false,
            created_at: now,
        };
        self.store.insert_conversation(&conversation).await?;
        Metrics::conversation_event("created");

        info!(
            conversation_id = %conversation.id,
            patient_id, clinic_id, "created conversation"
        );
        Ok((conversation, true))
    }

    pub async fn get(&self, conversation_id: &str) -> DeskResult<Conversation> {
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or(DeskError::NotFound("conversation"))
    }

    /// Stores a new message and refreshes the conversation summary in the same
    /// store call. Returns both as persisted.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        role: SenderRole,
        body: &str,
        kind: MessageKind,
    ) -> DeskResult<(Message, Conversation)> {
        let body = validate_body(body)?;
        self.append(conversation_id, sender_id, role, body, kind, role.into())
            .await
    }

    async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        role: SenderRole,
        body: String,
        kind: MessageKind,
        unread: UnreadChange,
    ) -> DeskResult<(Message, Conversation)> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_role: role,
            body,
            kind,
            created_at: Utc::now(),
            read: false,
        };
        let update = SummaryUpdate {
            unread,
            ..SummaryUpdate::for_message(&message)
        };

        let start = Instant::now();
        let conversation = self
            .store
            .append_message(&message, &update)
            .await?
            .ok_or(DeskError::NotFound("conversation"))?;
        Metrics::observe_db_query("append_message", start.elapsed());
        Metrics::chat_message_appended(
            kind.as_str(),
            match role {
                SenderRole::Patient => "patient",
                SenderRole::Clinic => "clinic",
            },
        );

        debug!(
            conversation_id,
            message_id = %message.id,
            unread = conversation.unread_count,
            "appended message"
        );
        Ok((message, conversation))
    }

    /// Marks the thread read on behalf of `reader`. The clinic reading resets
    /// the unread counter to zero; either side flips the read flag on the
    /// other side's messages.
    pub async fn mark_read(
        &self,
        conversation_id: &str,
        reader: SenderRole,
    ) -> DeskResult<Conversation> {
        let conversation = match reader {
            SenderRole::Clinic => self.store.reset_unread(conversation_id).await?,
            SenderRole::Patient => self.store.get_conversation(conversation_id).await?,
        }
        .ok_or(DeskError::NotFound("conversation"))?;

        let counterpart = match reader {
            SenderRole::Clinic => SenderRole::Patient,
            SenderRole::Patient => SenderRole::Clinic,
        };
        let flipped = self
            .store
            .mark_messages_read(conversation_id, counterpart)
            .await?;

        debug!(conversation_id, ?reader, flipped, "marked conversation read");
        Ok(conversation)
    }

    /// Hides the conversation from `party`. Once both parties have deleted it,
    /// the conversation and all of its messages are removed for good.
    pub async fn soft_delete(
        &self,
        conversation_id: &str,
        party: SenderRole,
    ) -> DeskResult<DeleteOutcome> {
        let conversation = self
            .store
            .set_hidden(conversation_id, party)
            .await?
            .ok_or(DeskError::NotFound("conversation"))?;

        if !(conversation.deleted_by_patient && conversation.deleted_by_clinic) {
            Metrics::conversation_event("hidden");
            info!(conversation_id, ?party, "conversation hidden");
            return Ok(DeleteOutcome::Hidden);
        }

        let removed = self.store.purge_conversation(conversation_id).await?;
        Metrics::conversation_event("purged");
        warn!(
            conversation_id,
            messages_removed = removed,
            "conversation purged after both parties deleted it"
        );
        Ok(DeleteOutcome::Purged)
    }

    /// The clinic's visible conversations, most recent activity first.
    pub async fn list_for_clinic(&self, clinic_id: &str) -> DeskResult<Vec<Conversation>> {
        let start = Instant::now();
        let mut conversations = self.store.conversations_for_clinic(clinic_id).await?;
        Metrics::observe_db_query("conversations_for_clinic", start.elapsed());

        conversations.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        Ok(conversations)
    }

    pub async fn messages(&self, conversation_id: &str) -> DeskResult<Vec<Message>> {
        Ok(self.store.messages(conversation_id).await?)
    }
}

fn validate_body(body: &str) -> DeskResult<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(DeskError::Validation("message body is required".into()));
    }
    if trimmed.chars().count() > MAX_BODY_CHARS {
        return Err(DeskError::Validation(format!(
            "message body exceeds {MAX_BODY_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}
