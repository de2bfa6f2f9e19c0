use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode};
use serde_json::Value;

use crate::{
    AppState,
    auth::Claims,
    contract::{MessageResponse, ResourceId, ValidJson, envelope},
    domain::{Filter, GoalPatch, GoalView, NewGoal},
    error::AppError,
    services::goals::{create_goal, delete_goal, find_goals, update_goal},
    store::Store,
};

const ONE: &str = "financialGoal";
const MANY: &str = "financialGoals";

async fn ensure_owner<S: Store>(store: &S, id: i64, claims: &Claims) -> Result<(), AppError> {
    if find_goals(store, Filter::owned_by(claims.sub).with_id(id))
        .await?
        .is_empty()
    {
        return Err(AppError::Forbidden(
            "This financial goal does not belong to logged user".to_string(),
        ));
    }
    Ok(())
}

pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, AppError> {
    let goals: Vec<GoalView> = find_goals(&state.store, Filter::owned_by(claims.sub))
        .await?
        .into_iter()
        .map(GoalView::from)
        .collect();

    envelope(format!("Retrieved {} financial goals", goals.len()), MANY, goals)
}

pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
    ValidJson(body): ValidJson<NewGoal>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let goal = create_goal(&state.store, claims.sub, body).await?;

    let body = envelope(
        format!("Financial goal for user {} created successfully", claims.sub),
        ONE,
        GoalView::from(goal),
    )?;
    Ok((StatusCode::CREATED, body))
}

pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
    ResourceId(id): ResourceId,
    ValidJson(patch): ValidJson<GoalPatch>,
) -> Result<Json<Value>, AppError> {
    ensure_owner(&state.store, id, &claims).await?;
    let goal = update_goal(&state.store, id, patch).await?;

    envelope(
        format!("Financial goal {} updated successfully", id),
        ONE,
        GoalView::from(goal),
    )
}

pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Extension(claims): Extension<Claims>,
    ResourceId(id): ResourceId,
) -> Result<Json<MessageResponse>, AppError> {
    ensure_owner(&state.store, id, &claims).await?;
    delete_goal(&state.store, id).await?;

    Ok(MessageResponse::new(format!(
        "Financial goal {} deleted successfully",
        id
    )))
}
