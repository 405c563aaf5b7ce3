use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::ChatError;
use crate::models::{ActorRef, ServerEvent};
use crate::services::presence::{OutboundFrame, PresenceRegistry};
use crate::services::store::ConversationStore;

/// Marks a reader's side of a conversation as read and tells the peer,
/// when they are online, that their messages were seen.
pub struct ReadReceiptCoordinator {
    store: Arc<dyn ConversationStore>,
    presence: PresenceRegistry,
}

impl ReadReceiptCoordinator {
    pub fn new(store: Arc<dyn ConversationStore>, presence: PresenceRegistry) -> Self {
        Self { store, presence }
    }

    /// Returns how many messages were newly marked. An unknown conversation
    /// marks nothing and is not an error; a repeated call marks nothing new
    /// but still re-sends the receipt to an online peer.
    pub async fn mark_read(
        &self,
        reader: &ActorRef,
        conversation_id: Uuid,
        auth_token: &str,
    ) -> Result<u64, ChatError> {
        let Some(conversation) = self.store.find(conversation_id, auth_token).await? else {
            debug!("mark_read on unknown conversation {}", conversation_id);
            return Ok(0);
        };

        if !conversation.involves(reader.id) {
            return Err(ChatError::Auth(
                "Not a participant in this conversation".to_string(),
            ));
        }

        let marked = self
            .store
            .mark_read(conversation_id, reader.id, auth_token)
            .await?;

        // Emitted whenever the conversation exists and the peer is online,
        // even when nothing was newly marked; the peer treats it as "my
        // messages here are seen", which holds in both cases.
        if let Some(peer) = conversation.peer_of(reader.id) {
            if let Some(handle) = self.presence.lookup(peer.id).await {
                // Best-effort: the read state is durable either way.
                let _ = handle.send(OutboundFrame::Event(ServerEvent::MessagesRead {
                    conversation_id,
                    reader_id: reader.id,
                }));
            }
        }

        Ok(marked)
    }
}
