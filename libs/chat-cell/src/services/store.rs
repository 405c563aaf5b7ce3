use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::json;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ChatError;
use crate::models::{ActorRef, Conversation, Message};

/// Durable home of conversations and messages. The seam exists so the
/// routing layer never depends on the concrete persistence backend.
///
/// Contract highlights:
/// - `find_or_create` must collapse concurrent first contacts between the
///   same pair into a single conversation.
/// - `append_message` atomically appends the row, refreshes the
///   last-message summary and bumps the receiver's unread counter.
/// - `mark_read` is idempotent and returns how many messages it newly
///   marked; an unknown conversation yields 0, not an error.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_or_create(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Conversation, ChatError>;

    async fn find(
        &self,
        conversation_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Conversation>, ChatError>;

    async fn append_message(
        &self,
        conversation_id: Uuid,
        sender: ActorRef,
        receiver: ActorRef,
        text: &str,
        auth_token: &str,
    ) -> Result<Message, ChatError>;

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        auth_token: &str,
    ) -> Result<u64, ChatError>;

    async fn conversations_for(
        &self,
        actor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Conversation>, ChatError>;

    /// The most recent `limit` messages, returned in creation order.
    async fn history(
        &self,
        conversation_id: Uuid,
        limit: usize,
        auth_token: &str,
    ) -> Result<Vec<Message>, ChatError>;
}

/// PostgREST-backed store. Multi-row mutations (append, mark-read) go
/// through Postgres functions so row + summary + counter commit as one
/// transaction; everything else is plain table access.
pub struct SupabaseConversationStore {
    supabase: SupabaseClient,
    op_timeout: Duration,
    timeout_seconds: u64,
}

impl SupabaseConversationStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            op_timeout: Duration::from_secs(config.chat_store_timeout_seconds),
            timeout_seconds: config.chat_store_timeout_seconds,
        }
    }

    /// Every store call gets a bounded wait; a hung backend surfaces as a
    /// timeout error instead of a stalled connection.
    async fn bounded<T>(
        &self,
        operation: impl Future<Output = anyhow::Result<T>> + Send,
    ) -> Result<T, ChatError> {
        match timeout(self.op_timeout, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ChatError::StoreUnavailable(e.to_string())),
            Err(_) => Err(ChatError::StoreTimeout {
                timeout_seconds: self.timeout_seconds,
            }),
        }
    }
}

#[async_trait]
impl ConversationStore for SupabaseConversationStore {
    async fn find_or_create(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Conversation, ChatError> {
        let lookup_path = format!(
            "/rest/v1/chat_conversations?patient_id=eq.{}&doctor_id=eq.{}&limit=1",
            patient_id, doctor_id
        );

        let existing: Vec<Conversation> = self
            .bounded(
                self.supabase
                    .request(Method::GET, &lookup_path, Some(auth_token), None),
            )
            .await?;
        if let Some(conversation) = existing.into_iter().next() {
            return Ok(conversation);
        }

        debug!(
            "Creating conversation for pair ({}, {})",
            patient_id, doctor_id
        );

        // The unique (patient_id, doctor_id) constraint absorbs a concurrent
        // first contact: ignore-duplicates turns the losing insert into an
        // empty response instead of a conflict error.
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=ignore-duplicates,return=representation"),
        );
        let inserted: Vec<Conversation> = self
            .bounded(self.supabase.request_with_headers(
                Method::POST,
                "/rest/v1/chat_conversations?on_conflict=patient_id,doctor_id",
                Some(auth_token),
                Some(json!({
                    "patient_id": patient_id,
                    "doctor_id": doctor_id,
                })),
                Some(headers),
            ))
            .await?;
        if let Some(conversation) = inserted.into_iter().next() {
            return Ok(conversation);
        }

        // Lost the race; the winner's row is committed by now.
        let raced: Vec<Conversation> = self
            .bounded(
                self.supabase
                    .request(Method::GET, &lookup_path, Some(auth_token), None),
            )
            .await?;
        raced.into_iter().next().ok_or_else(|| {
            ChatError::StoreUnavailable("Conversation upsert returned no row".to_string())
        })
    }

    async fn find(
        &self,
        conversation_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Conversation>, ChatError> {
        let path = format!(
            "/rest/v1/chat_conversations?id=eq.{}&limit=1",
            conversation_id
        );
        let rows: Vec<Conversation> = self
            .bounded(
                self.supabase
                    .request(Method::GET, &path, Some(auth_token), None),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        sender: ActorRef,
        receiver: ActorRef,
        text: &str,
        auth_token: &str,
    ) -> Result<Message, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::ValidationError(
                "Message text cannot be empty".to_string(),
            ));
        }

        let args = json!({
            "p_conversation_id": conversation_id,
            "p_sender_id": sender.id,
            "p_sender_kind": sender.kind,
            "p_receiver_id": receiver.id,
            "p_receiver_kind": receiver.kind,
            "p_text": text,
        });

        let message: Message = self
            .bounded(
                self.supabase
                    .rpc("append_chat_message", Some(auth_token), args),
            )
            .await?;

        debug!(
            "Appended message {} to conversation {}",
            message.id, conversation_id
        );
        Ok(message)
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        auth_token: &str,
    ) -> Result<u64, ChatError> {
        let args = json!({
            "p_conversation_id": conversation_id,
            "p_reader_id": reader_id,
        });

        let marked: i64 = self
            .bounded(
                self.supabase
                    .rpc("mark_conversation_read", Some(auth_token), args),
            )
            .await?;

        Ok(marked.max(0) as u64)
    }

    async fn conversations_for(
        &self,
        actor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Conversation>, ChatError> {
        let path = format!(
            "/rest/v1/chat_conversations?or=(patient_id.eq.{},doctor_id.eq.{})&order=last_message_at.desc.nullslast",
            actor_id, actor_id
        );
        self.bounded(
            self.supabase
                .request(Method::GET, &path, Some(auth_token), None),
        )
        .await
    }

    async fn history(
        &self,
        conversation_id: Uuid,
        limit: usize,
        auth_token: &str,
    ) -> Result<Vec<Message>, ChatError> {
        // Newest-first query to apply the cap, flipped back to creation order.
        let path = format!(
            "/rest/v1/chat_messages?conversation_id=eq.{}&order=created_at.desc&limit={}",
            conversation_id, limit
        );
        let mut rows: Vec<Message> = self
            .bounded(
                self.supabase
                    .request(Method::GET, &path, Some(auth_token), None),
            )
            .await?;
        rows.reverse();
        Ok(rows)
    }
}
