use crate::state::AppState;
use axum::Router;

pub mod aggregate;
pub mod dto;
pub mod handlers;
pub mod period;
pub mod repo;

pub fn router() -> Router<AppState> {
    handlers::finance_routes()
}
