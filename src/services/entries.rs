use crate::{
    domain::{Entry, EntryKind, EntryPatch, Filter, NewEntry},
    error::AppError,
    store::{Store, StoreError},
};

fn entry_not_found(kind: EntryKind) -> AppError {
    AppError::NotFound(format!("{} not found", kind.label()))
}

pub async fn find_entries<S: Store>(
    store: &S,
    kind: EntryKind,
    filter: Filter,
) -> Result<Vec<Entry>, AppError> {
    Ok(store.find_entries(kind, filter).await?)
}

pub async fn create_entry<S: Store>(
    store: &S,
    kind: EntryKind,
    owner_id: i64,
    entry: NewEntry,
) -> Result<Entry, AppError> {
    let entry = store
        .insert_entry(kind, owner_id, entry)
        .await
        .map_err(|err| match err {
            StoreError::ForeignKeyViolation => {
                AppError::NotFound("Specified user does not exist".to_string())
            }
            other => other.into(),
        })?;

    tracing::info!(
        "Created {} id={} for user_id={}",
        kind.noun(),
        entry.id,
        owner_id
    );
    Ok(entry)
}

pub async fn update_entry<S: Store>(
    store: &S,
    kind: EntryKind,
    id: i64,
    patch: EntryPatch,
) -> Result<Entry, AppError> {
    let mut entry = store
        .find_entries(kind, Filter::default().with_id(id))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| entry_not_found(kind))?;

    entry.apply(patch);

    store
        .save_entry(kind, &entry)
        .await?
        .ok_or_else(|| entry_not_found(kind))
}

pub async fn delete_entry<S: Store>(store: &S, kind: EntryKind, id: i64) -> Result<(), AppError> {
    if !store.delete_entry(kind, id).await? {
        return Err(entry_not_found(kind));
    }

    tracing::info!("Deleted {} id={}", kind.noun(), id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{NewUser, Role},
        store::SqliteStore,
    };
    use chrono::NaiveDate;

    async fn store_with_user() -> (SqliteStore, i64) {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store
            .insert_user(NewUser {
                email: "a@x.com".to_string(),
                hash: "hash".to_string(),
                roles: vec![Role::User],
            })
            .await
            .unwrap();
        (store, user.id)
    }

    fn rent() -> NewEntry {
        NewEntry {
            title: "Rent".to_string(),
            description: "Monthly rent".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            value: 1000.0,
            recurrence: Some(30),
        }
    }

    #[tokio::test]
    async fn test_create_for_missing_owner_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = create_entry(&store, EntryKind::Expense, 77, rent())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(message) if message == "Specified user does not exist"));
    }

    #[tokio::test]
    async fn test_create_returns_input_fields() {
        let (store, owner) = store_with_user().await;
        let entry = create_entry(&store, EntryKind::Revenue, owner, rent()).await.unwrap();

        assert_eq!(entry.owner_id, owner);
        assert_eq!(entry.title, "Rent");
        assert_eq!(entry.description, "Monthly rent");
        assert_eq!(entry.value, 1000.0);
        assert_eq!(entry.recurrence, Some(30));
    }

    #[tokio::test]
    async fn test_find_without_matches_is_empty() {
        let (store, owner) = store_with_user().await;
        let found = find_entries(&store, EntryKind::Expense, Filter::owned_by(owner))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let (store, owner) = store_with_user().await;
        let entry = create_entry(&store, EntryKind::Expense, owner, rent()).await.unwrap();

        let updated = update_entry(
            &store,
            EntryKind::Expense,
            entry.id,
            EntryPatch {
                title: Some("Mortgage".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Mortgage");
        assert_eq!(updated.description, entry.description);
        assert_eq!(updated.value, entry.value);
        assert_eq!(updated.date, entry.date);
    }

    #[tokio::test]
    async fn test_empty_update_returns_record_unchanged() {
        let (store, owner) = store_with_user().await;
        let entry = create_entry(&store, EntryKind::Expense, owner, rent()).await.unwrap();

        let updated = update_entry(&store, EntryKind::Expense, entry.id, EntryPatch::default())
            .await
            .unwrap();
        assert_eq!(updated, entry);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_entry() {
        let (store, _) = store_with_user().await;

        let err = update_entry(&store, EntryKind::Revenue, 9, EntryPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(message) if message == "Revenue not found"));

        let err = delete_entry(&store, EntryKind::Expense, 9).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let (store, owner) = store_with_user().await;
        let entry = create_entry(&store, EntryKind::Expense, owner, rent()).await.unwrap();

        delete_entry(&store, EntryKind::Expense, entry.id).await.unwrap();
        let found = find_entries(&store, EntryKind::Expense, Filter::owned_by(owner))
            .await
            .unwrap();
        assert!(found.is_empty());
    }
}
