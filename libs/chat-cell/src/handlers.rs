use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::HeaderMap,
    response::Response,
    Extension, Json,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::{auth::User, error::AppError};
use shared_utils::{extractor::bearer_token, jwt::validate_token};

use crate::models::{ActorKind, ActorRef, ClientEvent, ServerEvent};
use crate::router::ChatState;
use crate::services::presence::{ConnectionHandle, OutboundFrame};
use crate::services::query::ConversationQueryService;
use crate::services::receipts::ReadReceiptCoordinator;
use crate::services::session::ChatSessionService;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    /// Browsers cannot set headers on a WebSocket handshake, so the token
    /// may arrive as a query parameter instead of a bearer header.
    pub token: Option<String>,
}

/// Upgrades `GET /chat/ws`. The JWT is validated before the upgrade; an
/// unauthenticated socket never reaches the session loop.
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ChatState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)
        .map(str::to_string)
        .or(query.token)
        .ok_or_else(|| AppError::Auth("Missing chat token".to_string()))?;

    let user = validate_token(&token, &state.config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    info!("Chat socket opened for user: {}", user.id);
    Ok(ws.on_upgrade(move |socket| chat_session(socket, state, user, token)))
}

/// One connection's lifecycle: connected -> identified (registered in the
/// presence registry) -> active -> closed (deregistered). Errors stay on
/// this connection; they never leak into other sessions.
async fn chat_session(socket: WebSocket, state: ChatState, user: User, token: String) {
    let connection_id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();

    // Writer task: everything outbound funnels through one sender so the
    // registry and services can push events without touching the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                OutboundFrame::Event(event) => match serde_json::to_string(&event) {
                    Ok(payload) => {
                        if ws_tx.send(WsMessage::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to serialize outbound chat event: {}", e),
                },
                OutboundFrame::Close => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
    });

    let sessions = ChatSessionService::new(state.store.clone(), state.presence.clone());
    let receipts = ReadReceiptCoordinator::new(state.store.clone(), state.presence.clone());
    let queries =
        ConversationQueryService::new(state.store.clone(), state.config.chat_history_limit);

    let mut actor: Option<ActorRef> = None;

    while let Some(Ok(frame)) = ws_rx.next().await {
        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                debug!("Unparseable chat frame: {}", e);
                send_event(
                    &tx,
                    ServerEvent::Error {
                        message: format!("Unrecognized chat event: {}", e),
                    },
                );
                continue;
            }
        };

        match event {
            ClientEvent::Identify { actor_id, kind } => {
                match verify_identity(&user, actor_id, kind) {
                    Ok(identified) => {
                        let evicted = state
                            .presence
                            .register(identified.id, identified.kind, connection_id, tx.clone())
                            .await;
                        // Replacing another live session for this actor is
                        // explicit: the old connection learns why it closes.
                        if let Some(previous) = evicted {
                            if previous.connection_id != connection_id {
                                info!(
                                    "Actor {} reconnected, closing previous session",
                                    identified.id
                                );
                                let _ = previous
                                    .handle
                                    .send(OutboundFrame::Event(ServerEvent::SessionReplaced));
                                let _ = previous.handle.send(OutboundFrame::Close);
                            }
                        }
                        actor = Some(identified);
                    }
                    Err(message) => send_event(&tx, ServerEvent::Error { message }),
                }
            }
            other => {
                let Some(current) = actor else {
                    send_event(
                        &tx,
                        ServerEvent::Error {
                            message: "Identify before sending chat events".to_string(),
                        },
                    );
                    continue;
                };
                dispatch_event(
                    other, &current, &tx, &sessions, &receipts, &queries, &token,
                )
                .await;
            }
        }
    }

    if let Some(current) = actor {
        state.presence.unregister(current.id, connection_id).await;
    }
    drop(tx);
    let _ = writer.await;
    debug!("Chat socket closed for user: {}", user.id);
}

/// The token subject is the identity; `identify` only confirms it. A
/// mismatching id or kind is rejected without touching the registry.
fn verify_identity(user: &User, actor_id: Uuid, kind: ActorKind) -> Result<ActorRef, String> {
    let subject = Uuid::parse_str(&user.id)
        .map_err(|_| "Session token has no valid subject".to_string())?;

    if actor_id != subject {
        return Err("Declared identity does not match session token".to_string());
    }

    if let Some(expected) = user.role.as_deref().and_then(ActorKind::from_role) {
        if expected != kind {
            return Err("Declared kind does not match session token".to_string());
        }
    }

    Ok(ActorRef { id: subject, kind })
}

async fn dispatch_event(
    event: ClientEvent,
    actor: &ActorRef,
    tx: &ConnectionHandle,
    sessions: &ChatSessionService,
    receipts: &ReadReceiptCoordinator,
    queries: &ConversationQueryService,
    token: &str,
) {
    let result = match event {
        ClientEvent::SendMessage { receiver_id, text } => sessions
            .send(actor, receiver_id, &text, token)
            .await
            .map(|_| None),
        ClientEvent::GetHistory { conversation_id } => queries
            .history(conversation_id, token)
            .await
            .map(|messages| {
                Some(ServerEvent::ChatHistory {
                    conversation_id,
                    messages,
                })
            }),
        ClientEvent::GetConversations => queries
            .conversations(actor.id, token)
            .await
            .map(|conversations| Some(ServerEvent::UserConversations { conversations })),
        ClientEvent::MarkRead { conversation_id } => receipts
            .mark_read(actor, conversation_id, token)
            .await
            .map(|_| Some(ServerEvent::MessagesMarkedRead { conversation_id })),
        // Handled by the session loop before dispatch.
        ClientEvent::Identify { .. } => Ok(None),
    };

    match result {
        Ok(Some(reply)) => send_event(tx, reply),
        Ok(None) => {}
        Err(e) => {
            warn!("Chat event failed for actor {}: {}", actor.id, e);
            send_event(
                tx,
                ServerEvent::Error {
                    message: e.to_string(),
                },
            );
        }
    }
}

fn send_event(tx: &ConnectionHandle, event: ServerEvent) {
    if tx.send(OutboundFrame::Event(event)).is_err() {
        debug!("Writer task gone, dropping event");
    }
}

/// REST read of the caller's conversation list.
pub async fn get_conversations(
    State(state): State<ChatState>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let actor_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID format".to_string()))?;
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let queries =
        ConversationQueryService::new(state.store.clone(), state.config.chat_history_limit);
    let conversations = queries.conversations(actor_id, token).await?;

    Ok(Json(json!({
        "conversations": conversations
    })))
}

/// REST read of one conversation's capped history. Participants only;
/// unknown conversations read as empty.
pub async fn get_conversation_messages(
    State(state): State<ChatState>,
    Extension(user): Extension<User>,
    Path(conversation_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let actor_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user ID format".to_string()))?;
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    if let Some(conversation) = state.store.find(conversation_id, token).await? {
        if !conversation.involves(actor_id) {
            return Err(AppError::Auth("Access denied".to_string()));
        }
    }

    let queries =
        ConversationQueryService::new(state.store.clone(), state.config.chat_history_limit);
    let messages = queries.history(conversation_id, token).await?;

    Ok(Json(json!({
        "conversation_id": conversation_id,
        "messages": messages
    })))
}

pub async fn health_check(State(state): State<ChatState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "chat-cell",
        "online_sessions": state.presence.online_count().await
    }))
}
