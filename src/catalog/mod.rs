use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod loader;
pub mod render;
pub mod search;
pub mod subjects;
pub mod types;

pub use loader::Catalog;
pub use render::MarkupRenderer;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
