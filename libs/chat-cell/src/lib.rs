// libs/chat-cell/src/lib.rs
//! # Chat Cell
//!
//! Real-time patient-doctor messaging: presence tracking, message routing,
//! persisted conversation history with unread counters and read receipts.
//!
//! ## Architecture
//!
//! The chat cell follows the established cell architecture pattern:
//!
//! ```text
//! +-----------------------------------------------------+
//! |                    Chat Cell                        |
//! +-----------------------------------------------------+
//! |  handlers.rs    |  WebSocket session + REST reads   |
//! |  router.rs      |  Route definitions & shared state |
//! |  models.rs      |  Data structures & wire protocol  |
//! |  services/      |  Business logic layer             |
//! |    presence.rs  |  In-memory presence registry      |
//! |    store.rs     |  Durable conversation store       |
//! |    session.rs   |  Message routing & fan-out        |
//! |    receipts.rs  |  Read receipts                    |
//! |    query.rs     |  Conversation/history reads       |
//! +-----------------------------------------------------+
//! ```
//!
//! ## Protocol
//!
//! A client connects to `GET /chat/ws` with a valid JWT (bearer header or
//! `?token=` query parameter), then exchanges JSON events tagged by `type`:
//!
//! - inbound: `identify`, `send-message`, `get-history`,
//!   `get-conversations`, `mark-read`
//! - outbound: `presence-changed`, `new-message`, `message-notification`,
//!   `chat-history`, `user-conversations`, `messages-read`,
//!   `messages-marked-read`, `session-replaced`, `error`
//!
//! Identity always comes from the verified token subject; a client cannot
//! act as another actor by declaring a different id.
//!
//! ## REST Endpoints
//!
//! - `GET /chat/conversations` - the caller's conversation list
//! - `GET /chat/conversations/{id}/messages` - capped message history
//! - `GET /chat/health` - liveness + online session count

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::ChatError;
pub use models::{
    ActorKind, ActorRef, ClientEvent, Conversation, Message, ServerEvent,
};
pub use services::{
    presence::{ConnectionHandle, OutboundFrame, PresenceEntry, PresenceRegistry},
    query::ConversationQueryService,
    receipts::ReadReceiptCoordinator,
    session::ChatSessionService,
    store::{ConversationStore, SupabaseConversationStore},
};
pub use router::{chat_routes, chat_routes_with_state, ChatState};
