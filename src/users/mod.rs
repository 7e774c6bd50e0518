mod dto;
pub mod handlers;
mod pagination;
mod password;
pub mod repo;
pub mod repo_types;
mod services;
pub mod upload;

use crate::state::AppState;
use axum::Router;

/// Path the user resource is nested under.
pub const MOUNT: &str = "/users";

pub fn router(body_limit: usize) -> Router<AppState> {
    Router::new().merge(handlers::user_routes(body_limit))
}
