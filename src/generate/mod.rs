use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod handlers;
pub mod provider;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::router()
}
