use crate::state::AppState;
use axum::{routing::get, Router};

pub mod dto;
pub mod handlers;
pub mod hub;
pub mod repo;
pub mod services;
pub mod ws;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat/chat-list", get(handlers::chat_list))
        .route("/chat/messages/:receiver_id", get(handlers::get_messages))
        .route("/ws", get(ws::ws_handler))
}
