//! Shared fixtures: channel helpers and an in-memory conversation store
//! implementing the same contract as the Supabase-backed one.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use chat_cell::{
    ActorRef, ChatError, ConnectionHandle, Conversation, ConversationStore, Message,
    OutboundFrame, ServerEvent,
};

pub fn connection() -> (ConnectionHandle, mpsc::UnboundedReceiver<OutboundFrame>) {
    mpsc::unbounded_channel()
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<OutboundFrame>) -> ServerEvent {
    match timeout(Duration::from_secs(1), rx.recv()).await {
        Ok(Some(OutboundFrame::Event(event))) => event,
        Ok(Some(OutboundFrame::Close)) => panic!("Expected an event frame, got a close frame"),
        Ok(None) => panic!("Connection channel closed while waiting for an event"),
        Err(_) => panic!("Timed out waiting for an event"),
    }
}

pub async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<OutboundFrame>) {
    let outcome = timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(outcome.is_err(), "Expected silence, got {:?}", outcome);
}

#[derive(Default)]
struct StoreInner {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
}

/// Single-mutex store: the lock serializes competing appenders the way the
/// database serializes concurrent writes to one conversation row.
#[derive(Default)]
pub struct InMemoryConversationStore {
    inner: Mutex<StoreInner>,
    fail_appends: AtomicBool,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Makes every subsequent append fail as if the backend were down.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub async fn conversation_count(&self) -> usize {
        self.inner.lock().await.conversations.len()
    }

    pub async fn conversation_snapshot(&self, conversation_id: Uuid) -> Option<Conversation> {
        let inner = self.inner.lock().await;
        inner
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned()
    }

    pub async fn message_snapshot(&self, conversation_id: Uuid) -> Vec<Message> {
        let inner = self.inner.lock().await;
        inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find_or_create(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        _auth_token: &str,
    ) -> Result<Conversation, ChatError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner
            .conversations
            .iter()
            .find(|c| c.patient_id == patient_id && c.doctor_id == doctor_id)
        {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            patient_unread_count: 0,
            doctor_unread_count: 0,
            last_message_text: None,
            last_message_sender_id: None,
            last_message_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn find(
        &self,
        conversation_id: Uuid,
        _auth_token: &str,
    ) -> Result<Option<Conversation>, ChatError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned())
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        sender: ActorRef,
        receiver: ActorRef,
        text: &str,
        _auth_token: &str,
    ) -> Result<Message, ChatError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(ChatError::StoreUnavailable(
                "Injected append failure".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(ChatError::ValidationError(
                "Message text cannot be empty".to_string(),
            ));
        }

        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: sender.id,
            sender_kind: sender.kind,
            receiver_id: receiver.id,
            receiver_kind: receiver.kind,
            text: text.to_string(),
            read: false,
            read_at: None,
            created_at: now,
        };

        let conversation = inner
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or(ChatError::NotFound(conversation_id))?;

        conversation.last_message_text = Some(text.to_string());
        conversation.last_message_sender_id = Some(sender.id);
        conversation.last_message_at = Some(now);
        conversation.updated_at = now;
        if receiver.id == conversation.patient_id {
            conversation.patient_unread_count += 1;
        } else {
            conversation.doctor_unread_count += 1;
        }

        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        _auth_token: &str,
    ) -> Result<u64, ChatError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let mut marked = 0;
        for message in inner
            .messages
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id && m.receiver_id == reader_id)
        {
            if !message.read {
                message.read = true;
                message.read_at = Some(now);
                marked += 1;
            }
        }

        if let Some(conversation) = inner
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            if reader_id == conversation.patient_id {
                conversation.patient_unread_count = 0;
            } else if reader_id == conversation.doctor_id {
                conversation.doctor_unread_count = 0;
            }
        }

        Ok(marked)
    }

    async fn conversations_for(
        &self,
        actor_id: Uuid,
        _auth_token: &str,
    ) -> Result<Vec<Conversation>, ChatError> {
        let inner = self.inner.lock().await;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .iter()
            .filter(|c| c.involves(actor_id))
            .cloned()
            .collect();
        // Most recently active first, never-used conversations last.
        conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(conversations)
    }

    async fn history(
        &self,
        conversation_id: Uuid,
        limit: usize,
        _auth_token: &str,
    ) -> Result<Vec<Message>, ChatError> {
        let inner = self.inner.lock().await;
        let matching: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        let start = matching.len().saturating_sub(limit);
        Ok(matching[start..].to_vec())
    }
}
