use std::sync::Arc;

use axum::{
    middleware,
    routing::get,
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{
    chat_ws_handler, get_conversation_messages, get_conversations, health_check,
};
use crate::services::presence::PresenceRegistry;
use crate::services::store::{ConversationStore, SupabaseConversationStore};

/// Everything a chat connection or handler needs, shared across the cell.
/// The presence registry lives here so all sessions see the same map.
#[derive(Clone)]
pub struct ChatState {
    pub config: Arc<AppConfig>,
    pub presence: PresenceRegistry,
    pub store: Arc<dyn ConversationStore>,
}

pub fn chat_routes(config: Arc<AppConfig>) -> Router {
    let store: Arc<dyn ConversationStore> = Arc::new(SupabaseConversationStore::new(&config));
    chat_routes_with_state(ChatState {
        config,
        presence: PresenceRegistry::new(),
        store,
    })
}

/// Split out so tests can inject their own store and registry.
pub fn chat_routes_with_state(state: ChatState) -> Router {
    let protected_routes = Router::new()
        .route("/conversations", get(get_conversations))
        .route(
            "/conversations/{conversation_id}/messages",
            get(get_conversation_messages),
        )
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/ws", get(chat_ws_handler))
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}
