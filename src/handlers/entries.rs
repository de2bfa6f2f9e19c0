use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use serde_json::Value;

use crate::{
    AppState,
    auth::Claims,
    contract::{MessageResponse, ResourceId, ValidJson, envelope},
    domain::{EntryKind, EntryPatch, EntryView, Filter, NewEntry},
    error::AppError,
    services::entries::{create_entry, delete_entry, find_entries, update_entry},
    store::Store,
};

/// Rejects with 403 unless the caller owns the entry. Missing ids get the same answer.
async fn ensure_owner<S: Store>(
    store: &S,
    kind: EntryKind,
    id: i64,
    claims: &Claims,
) -> Result<(), AppError> {
    let owned = find_entries(store, kind, Filter::owned_by(claims.sub).with_id(id)).await?;
    if owned.is_empty() {
        tracing::info!(
            "User id={} tried to modify {} id={} it does not own",
            claims.sub,
            kind.noun(),
            id
        );
        return Err(AppError::Forbidden(format!(
            "This {} does not belong to logged user",
            kind.noun()
        )));
    }
    Ok(())
}

pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<EntryKind>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, AppError> {
    let entries: Vec<EntryView> = find_entries(&state.store, kind, Filter::owned_by(claims.sub))
        .await?
        .into_iter()
        .map(EntryView::from)
        .collect();

    envelope(
        format!("Retrieved {} {}", entries.len(), kind.plural()),
        kind.plural(),
        entries,
    )
}

pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<EntryKind>,
    Extension(claims): Extension<Claims>,
    ValidJson(body): ValidJson<NewEntry>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let entry = create_entry(&state.store, kind, claims.sub, body).await?;

    let body = envelope(
        format!("{} for user {} created successfully", kind.label(), claims.sub),
        kind.noun(),
        EntryView::from(entry),
    )?;
    Ok((StatusCode::CREATED, body))
}

pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<EntryKind>,
    Extension(claims): Extension<Claims>,
    ResourceId(id): ResourceId,
    ValidJson(patch): ValidJson<EntryPatch>,
) -> Result<Json<Value>, AppError> {
    ensure_owner(&state.store, kind, id, &claims).await?;
    let entry = update_entry(&state.store, kind, id, patch).await?;

    envelope(
        format!("{} {} updated successfully", kind.label(), id),
        kind.noun(),
        EntryView::from(entry),
    )
}

pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(kind): Extension<EntryKind>,
    Extension(claims): Extension<Claims>,
    ResourceId(id): ResourceId,
) -> Result<Json<MessageResponse>, AppError> {
    ensure_owner(&state.store, kind, id, &claims).await?;
    delete_entry(&state.store, kind, id).await?;

    Ok(MessageResponse::new(format!(
        "{} {} deleted successfully",
        kind.label(),
        id
    )))
}
