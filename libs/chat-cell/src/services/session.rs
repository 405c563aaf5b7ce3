use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ChatError;
use crate::models::{ActorKind, ActorRef, Message, ServerEvent};
use crate::services::presence::{OutboundFrame, PresenceRegistry};
use crate::services::store::ConversationStore;

/// Routes a send intent from one identified connection: validates it,
/// resolves the conversation, persists the message and fans the result out
/// to the two participants - and only the two participants.
pub struct ChatSessionService {
    store: Arc<dyn ConversationStore>,
    presence: PresenceRegistry,
}

impl ChatSessionService {
    pub fn new(store: Arc<dyn ConversationStore>, presence: PresenceRegistry) -> Self {
        Self { store, presence }
    }

    pub async fn send(
        &self,
        sender: &ActorRef,
        receiver_id: Uuid,
        text: &str,
        auth_token: &str,
    ) -> Result<Message, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::ValidationError(
                "Message text cannot be empty".to_string(),
            ));
        }
        if receiver_id == sender.id {
            return Err(ChatError::ValidationError(
                "Cannot send a message to yourself".to_string(),
            ));
        }

        // Conversations only exist between complementary kinds, so the
        // receiver's kind is fully determined by the sender's.
        let receiver = ActorRef {
            id: receiver_id,
            kind: sender.kind.complement(),
        };

        // Canonical pair key: patient first.
        let (patient_id, doctor_id) = match sender.kind {
            ActorKind::Patient => (sender.id, receiver.id),
            ActorKind::Doctor => (receiver.id, sender.id),
        };

        let conversation = self
            .store
            .find_or_create(patient_id, doctor_id, auth_token)
            .await?;
        let message = self
            .store
            .append_message(conversation.id, *sender, receiver, text, auth_token)
            .await?;

        // Committed from here on: notification failures no longer fail the
        // send, the message is already durable.
        let event = ServerEvent::NewMessage {
            conversation_id: conversation.id,
            message: message.clone(),
        };
        self.notify(sender.id, event.clone()).await;
        if self.notify(receiver.id, event).await {
            self.notify(
                receiver.id,
                ServerEvent::MessageNotification {
                    conversation_id: conversation.id,
                    message: message.clone(),
                },
            )
            .await;
        } else {
            debug!(
                "Receiver {} offline, message {} awaits their next query",
                receiver.id, message.id
            );
        }

        Ok(message)
    }

    /// Best-effort delivery to one actor's connection. A connection that
    /// vanished between lookup and send is not an error.
    async fn notify(&self, actor_id: Uuid, event: ServerEvent) -> bool {
        match self.presence.lookup(actor_id).await {
            Some(handle) => {
                if handle.send(OutboundFrame::Event(event)).is_err() {
                    warn!("Connection for actor {} closed before delivery", actor_id);
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }
}
