mod postgres;
mod sqlite;

pub use postgres::PgStore;
pub use sqlite::SqliteStore;

use thiserror::Error;

use crate::domain::{
    Entry, EntryKind, Filter, FinancialGoal, NewEntry, NewGoal, NewUser, Role, User, UserKey,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unique constraint violated")]
    UniqueViolation,

    #[error("Foreign key constraint violated")]
    ForeignKeyViolation,

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation;
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation;
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Parses stored role names, skipping any the service no longer knows.
fn parse_roles<'a>(user_id: i64, names: impl IntoIterator<Item = &'a str>) -> Vec<Role> {
    names
        .into_iter()
        .filter(|name| !name.is_empty())
        .filter_map(|name| {
            name.parse::<Role>()
                .inspect_err(|err| {
                    tracing::warn!("Ignoring stored role for user id={}: {}", user_id, err)
                })
                .ok()
        })
        .collect()
}

/// Unique email, owners must exist, and deleting a user deletes what it owns. Violations
/// come back as [`StoreError::UniqueViolation`] and [`StoreError::ForeignKeyViolation`].

pub trait Store: Clone + Send + Sync + 'static {
    fn insert_user(&self, user: NewUser) -> impl Future<Output = StoreResult<User>> + Send;

    fn find_user(&self, key: &UserKey) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Users ordered by id.
    fn list_users(
        &self,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = StoreResult<Vec<User>>> + Send;

    /// Overwrites the stored user with the same id. `None` if it no longer exists.
    fn save_user(&self, user: &User) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Returns whether a user was deleted.
    fn delete_user(&self, key: &UserKey) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Entries ordered by date, newest first.
    fn find_entries(
        &self,
        kind: EntryKind,
        filter: Filter,
    ) -> impl Future<Output = StoreResult<Vec<Entry>>> + Send;

    fn insert_entry(
        &self,
        kind: EntryKind,
        owner_id: i64,
        entry: NewEntry,
    ) -> impl Future<Output = StoreResult<Entry>> + Send;

    fn save_entry(
        &self,
        kind: EntryKind,
        entry: &Entry,
    ) -> impl Future<Output = StoreResult<Option<Entry>>> + Send;

    fn delete_entry(&self, kind: EntryKind, id: i64)
    -> impl Future<Output = StoreResult<bool>> + Send;

    /// Goals ordered by limit date, soonest first.
    fn find_goals(&self, filter: Filter)
    -> impl Future<Output = StoreResult<Vec<FinancialGoal>>> + Send;

    fn insert_goal(
        &self,
        owner_id: i64,
        goal: NewGoal,
    ) -> impl Future<Output = StoreResult<FinancialGoal>> + Send;

    fn save_goal(
        &self,
        goal: &FinancialGoal,
    ) -> impl Future<Output = StoreResult<Option<FinancialGoal>>> + Send;

    fn delete_goal(&self, id: i64) -> impl Future<Output = StoreResult<bool>> + Send;
}
