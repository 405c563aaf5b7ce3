use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use chat_cell::router::chat_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Telehealth chat API is running!" }))
        .nest("/chat", chat_routes(state.clone()))
}
