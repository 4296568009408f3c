use crate::state::AppState;
use axum::Router;

pub mod anonymous;
pub mod dto;
pub mod handlers;
pub mod policy;
pub mod repo;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
