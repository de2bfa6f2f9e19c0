use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;

use crate::{
    AppState,
    contract::{LoginRequest, SignupRequest, TokenResponse, ValidJson, envelope},
    domain::UserView,
    error::AppError,
    services::users::{login as login_user, signup as signup_user},
    store::Store,
};

pub async fn signup<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidJson(body): ValidJson<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user = signup_user(&state.store, &state.auth, body).await?;

    let body = envelope("Registered user successfully", "user", UserView::from(user))?;
    Ok((StatusCode::CREATED, body))
}

pub async fn login<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = login_user(&state.store, &state.auth, &body.email, &body.password).await?;

    Ok(Json(TokenResponse {
        message: "Logged in successfully".to_string(),
        token,
    }))
}
