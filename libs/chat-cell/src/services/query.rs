use std::sync::Arc;

use uuid::Uuid;

use crate::error::ChatError;
use crate::models::{Conversation, Message};
use crate::services::store::ConversationStore;

/// Read-only views over the conversation store for UI population. No side
/// effects: listing or reading history never touches unread counters.
pub struct ConversationQueryService {
    store: Arc<dyn ConversationStore>,
    history_limit: usize,
}

impl ConversationQueryService {
    pub fn new(store: Arc<dyn ConversationStore>, history_limit: usize) -> Self {
        Self {
            store,
            history_limit,
        }
    }

    /// The actor's conversations, most recently active first.
    pub async fn conversations(
        &self,
        actor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Conversation>, ChatError> {
        self.store.conversations_for(actor_id, auth_token).await
    }

    /// Capped message history in creation order; unknown ids read as empty.
    pub async fn history(
        &self,
        conversation_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Message>, ChatError> {
        self.store
            .history(conversation_id, self.history_limit, auth_token)
            .await
    }
}
