use sqlx::{PgPool, postgres::PgPoolOptions};

use super::{Store, StoreResult, parse_roles};
use crate::domain::{
    Entry, EntryKind, Filter, FinancialGoal, NewEntry, NewGoal, NewUser, Role, User, UserKey,
};

const MAX_CONNECTIONS: u32 = 10;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects and brings the schema up to date with the embedded migrations.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await?;

        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations/postgres").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    hash: String,
    roles: Vec<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let roles = parse_roles(row.id, row.roles.iter().map(String::as_str));
        User {
            id: row.id,
            email: row.email,
            hash: row.hash,
            roles,
        }
    }
}

fn role_names(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|role| role.as_str().to_string()).collect()
}

const USER_COLUMNS: &str = "id, email, hash, roles";
const ENTRY_COLUMNS: &str = "id, user_id, title, description, date, value, recurrence";
const GOAL_COLUMNS: &str = "id, user_id, description, value, limit_date";

impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "
                INSERT INTO users (email, hash, roles)
                VALUES ($1, $2, $3)
                RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&user.email)
        .bind(&user.hash)
        .bind(role_names(&user.roles))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_user(&self, key: &UserKey) -> StoreResult<Option<User>> {
        let row = match key {
            UserKey::Id(id) => {
                sqlx::query_as::<_, UserRow>(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
                ))
                .bind(*id)
                .fetch_optional(&self.pool)
                .await?
            }
            UserKey::Email(email) => {
                sqlx::query_as::<_, UserRow>(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
                ))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row.map(User::from))
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "
                SELECT {USER_COLUMNS} FROM users
                ORDER BY id
                LIMIT $1 OFFSET $2
            "
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn save_user(&self, user: &User) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "
                UPDATE users SET
                    email = $2,
                    hash = $3,
                    roles = $4
                WHERE id = $1
                RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.hash)
        .bind(role_names(&user.roles))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn delete_user(&self, key: &UserKey) -> StoreResult<bool> {
        let result = match key {
            UserKey::Id(id) => {
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(*id)
                    .execute(&self.pool)
                    .await?
            }
            UserKey::Email(email) => {
                sqlx::query("DELETE FROM users WHERE email = $1")
                    .bind(email)
                    .execute(&self.pool)
                    .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    async fn find_entries(&self, kind: EntryKind, filter: Filter) -> StoreResult<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            "
                SELECT {ENTRY_COLUMNS} FROM {table}
                WHERE ($1::BIGINT IS NULL OR id = $1)
                    AND ($2::BIGINT IS NULL OR user_id = $2)
                ORDER BY date DESC, id DESC
            ",
            table = kind.table()
        ))
        .bind(filter.id)
        .bind(filter.owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn insert_entry(
        &self,
        kind: EntryKind,
        owner_id: i64,
        entry: NewEntry,
    ) -> StoreResult<Entry> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "
                INSERT INTO {table} (
                    user_id,
                    title,
                    description,
                    date,
                    value,
                    recurrence
                ) VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {ENTRY_COLUMNS}
            ",
            table = kind.table()
        ))
        .bind(owner_id)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.date)
        .bind(entry.value)
        .bind(entry.recurrence)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|err| {
            tracing::error!(
                "Failed to insert {} for user_id={}: {}",
                kind.noun(),
                owner_id,
                err
            );
        })?;

        Ok(entry)
    }

    async fn save_entry(&self, kind: EntryKind, entry: &Entry) -> StoreResult<Option<Entry>> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "
                UPDATE {table} SET
                    title = $2,
                    description = $3,
                    date = $4,
                    value = $5,
                    recurrence = $6
                WHERE id = $1
                RETURNING {ENTRY_COLUMNS}
            ",
            table = kind.table()
        ))
        .bind(entry.id)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.date)
        .bind(entry.value)
        .bind(entry.recurrence)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn delete_entry(&self, kind: EntryKind, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_goals(&self, filter: Filter) -> StoreResult<Vec<FinancialGoal>> {
        let goals = sqlx::query_as::<_, FinancialGoal>(&format!(
            "
                SELECT {GOAL_COLUMNS} FROM financial_goals
                WHERE ($1::BIGINT IS NULL OR id = $1)
                    AND ($2::BIGINT IS NULL OR user_id = $2)
                ORDER BY limit_date, id
            "
        ))
        .bind(filter.id)
        .bind(filter.owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(goals)
    }

    async fn insert_goal(&self, owner_id: i64, goal: NewGoal) -> StoreResult<FinancialGoal> {
        let goal = sqlx::query_as::<_, FinancialGoal>(&format!(
            "
                INSERT INTO financial_goals (
                    user_id,
                    description,
                    value,
                    limit_date
                ) VALUES ($1, $2, $3, $4)
                RETURNING {GOAL_COLUMNS}
            "
        ))
        .bind(owner_id)
        .bind(&goal.description)
        .bind(goal.value)
        .bind(goal.limit_date)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|err| {
            tracing::error!("Failed to insert financial goal for user_id={}: {}", owner_id, err);
        })?;

        Ok(goal)
    }

    async fn save_goal(&self, goal: &FinancialGoal) -> StoreResult<Option<FinancialGoal>> {
        let goal = sqlx::query_as::<_, FinancialGoal>(&format!(
            "
                UPDATE financial_goals SET
                    description = $2,
                    value = $3,
                    limit_date = $4
                WHERE id = $1
                RETURNING {GOAL_COLUMNS}
            "
        ))
        .bind(goal.id)
        .bind(&goal.description)
        .bind(goal.value)
        .bind(goal.limit_date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(goal)
    }

    async fn delete_goal(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM financial_goals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
