use crate::{
    domain::{Filter, FinancialGoal, GoalPatch, NewGoal},
    error::AppError,
    store::{Store, StoreError},
};

fn goal_not_found() -> AppError {
    AppError::NotFound("Financial goal not found".to_string())
}

pub async fn find_goals<S: Store>(store: &S, filter: Filter) -> Result<Vec<FinancialGoal>, AppError> {
    Ok(store.find_goals(filter).await?)
}

pub async fn create_goal<S: Store>(
    store: &S,
    owner_id: i64,
    goal: NewGoal,
) -> Result<FinancialGoal, AppError> {
    let goal = store
        .insert_goal(owner_id, goal)
        .await
        .map_err(|err| match err {
            StoreError::ForeignKeyViolation => {
                AppError::NotFound("Specified user does not exist".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!("Created financial goal id={} for user_id={}", goal.id, owner_id);
    Ok(goal)
}

pub async fn update_goal<S: Store>(
    store: &S,
    id: i64,
    patch: GoalPatch,
) -> Result<FinancialGoal, AppError> {
    let mut goal = store
        .find_goals(Filter::default().with_id(id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(goal_not_found)?;

    goal.apply(patch);

    store.save_goal(&goal).await?.ok_or_else(goal_not_found)
}

pub async fn delete_goal<S: Store>(store: &S, id: i64) -> Result<(), AppError> {
    if !store.delete_goal(id).await? {
        return Err(goal_not_found());
    }

    tracing::info!("Deleted financial goal id={}", id);
    Ok(())
}
