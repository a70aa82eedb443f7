use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod memory;
pub mod model;
pub mod repo;
pub mod validation;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::users_routes())
}
