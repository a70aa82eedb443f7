use crate::state::AppState;
use axum::Router;

mod claims;
pub mod code;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;

pub use claims::Claims;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
