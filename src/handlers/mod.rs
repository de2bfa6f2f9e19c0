pub mod auth;
pub mod entries;
pub mod goals;
pub mod users;

use crate::{contract::MessageResponse, error::AppError};
use axum::Json;

#[axum::debug_handler]
pub async fn health() -> Json<MessageResponse> {
    MessageResponse::new("OK")
}

pub async fn fallback() -> AppError {
    AppError::NotFound("Route not found".to_string())
}
