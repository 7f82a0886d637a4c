use std::{sync::Arc, time::Duration};

use crate::{
    appointments::AppointmentDesk,
    conversations::ConversationStore,
    session::{MemorySessionStore, SessionStore},
    store::{DeskStore, MemoryStore, StoreResult},
};

#[cfg(feature = "mongo_db")]
use crate::store::{MongoDbConfig, MongoStore};

pub struct DeskState {
    pub store: Arc<dyn DeskStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub conversations: ConversationStore,
    pub appointments: AppointmentDesk,
    pub intake_api_key: String,
}

impl DeskState {
    fn new(
        store: Arc<dyn DeskStore>,
        sessions: Arc<dyn SessionStore>,
        intake_api_key: String,
    ) -> Self {
        let conversations = ConversationStore::new(store.clone());
        let appointments = AppointmentDesk::new(store.clone(), conversations.clone());

        Self {
            store,
            sessions,
            conversations,
            appointments,
            intake_api_key,
        }
    }
}

pub struct DeskStateBuilder {
    intake_api_key: String,
    session_ttl: Duration,
    store: Option<Arc<dyn DeskStore>>,
    sessions: Option<Arc<dyn SessionStore>>,
    #[cfg(feature = "mongo_db")]
    mongo_config: Option<MongoDbConfig>,
}

impl DeskStateBuilder {
    pub fn new(intake_api_key: impl Into<String>) -> Self {
        Self {
            intake_api_key: intake_api_key.into(),
            session_ttl: Duration::from_secs(8 * 60 * 60),
            store: None,
            sessions: None,
            #[cfg(feature = "mongo_db")]
            mongo_config: None,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DeskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    #[cfg(feature = "mongo_db")]
    pub fn with_mongo_config(mut self, config: MongoDbConfig) -> Self {
        self.mongo_config = Some(config);
        self
    }

    pub async fn build(self) -> StoreResult<DeskState> {
        #[cfg(feature = "mongo_db")]
        let store: Arc<dyn DeskStore> = match (self.store, self.mongo_config) {
            (Some(store), _) => store,
            (None, Some(config)) => Arc::new(MongoStore::connect(&config).await?),
            (None, None) => Arc::new(MemoryStore::new()),
        };

        #[cfg(not(feature = "mongo_db"))]
        let store: Arc<dyn DeskStore> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn DeskStore>);

        let session_ttl = self.session_ttl;
        let sessions: Arc<dyn SessionStore> = self.sessions.unwrap_or_else(|| {
            Arc::new(MemorySessionStore::new(session_ttl)) as Arc<dyn SessionStore>
        });

        Ok(DeskState::new(store, sessions, self.intake_api_key))
    }
}
