use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;

use crate::{
    AppState,
    contract::{
        CreateUserRequest, EmailParam, MessageResponse, Pagination, ResourceId, UpdateUserRequest,
        ValidJson, ValidQuery, envelope,
    },
    domain::{UserKey, UserView},
    error::AppError,
    services::users::{admin_create_user, delete_user, find_user, list_users, update_user},
    store::Store,
};

async fn get_user<S: Store>(state: &AppState<S>, key: UserKey) -> Result<Json<Value>, AppError> {
    let user = find_user(&state.store, &key).await?;
    envelope(
        "Retrieved specified user successfully",
        "user",
        UserView::from(user),
    )
}

async fn patch_user<S: Store>(
    state: &AppState<S>,
    key: UserKey,
    body: UpdateUserRequest,
) -> Result<Json<Value>, AppError> {
    let user = update_user(&state.store, &state.auth, &key, body).await?;
    envelope("User updated successfully", "user", UserView::from(user))
}

async fn remove_user<S: Store>(
    state: &AppState<S>,
    key: UserKey,
) -> Result<Json<MessageResponse>, AppError> {
    delete_user(&state.store, &key).await?;
    Ok(MessageResponse::new("User deleted successfully"))
}

pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidJson(body): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let user = admin_create_user(&state.store, &state.auth, body).await?;

    let body = envelope("User created successfully", "user", UserView::from(user))?;
    Ok((StatusCode::CREATED, body))
}

pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ValidQuery(page): ValidQuery<Pagination>,
) -> Result<Json<Value>, AppError> {
    let users: Vec<UserView> = list_users(&state.store, page)
        .await?
        .into_iter()
        .map(UserView::from)
        .collect();

    envelope("Retrieved all users successfully", "users", users)
}

pub async fn get_by_id<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResourceId(id): ResourceId,
) -> Result<Json<Value>, AppError> {
    get_user(&state, UserKey::Id(id)).await
}

pub async fn get_by_email<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    EmailParam(email): EmailParam,
) -> Result<Json<Value>, AppError> {
    get_user(&state, UserKey::Email(email)).await
}

pub async fn update_by_id<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResourceId(id): ResourceId,
    ValidJson(body): ValidJson<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    patch_user(&state, UserKey::Id(id), body).await
}

pub async fn update_by_email<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    EmailParam(email): EmailParam,
    ValidJson(body): ValidJson<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    patch_user(&state, UserKey::Email(email), body).await
}

pub async fn delete_by_id<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    ResourceId(id): ResourceId,
) -> Result<Json<MessageResponse>, AppError> {
    remove_user(&state, UserKey::Id(id)).await
}

pub async fn delete_by_email<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    EmailParam(email): EmailParam,
) -> Result<Json<MessageResponse>, AppError> {
    remove_user(&state, UserKey::Email(email)).await
}
