use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use super::{Store, StoreResult, parse_roles};
use crate::domain::{
    Entry, EntryKind, Filter, FinancialGoal, NewEntry, NewGoal, NewUser, Role, User, UserKey,
};

const IN_MEMORY_URL: &str = "sqlite::memory:";

/// SQLite database that lives in memory for as long as the store (or any clone) does.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(IN_MEMORY_URL)?.foreign_keys(true);

        // Every connection to `:memory:` opens a separate database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations/sqlite").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    hash: String,
    roles: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let roles = parse_roles(row.id, row.roles.split(','));
        User {
            id: row.id,
            email: row.email,
            hash: row.hash,
            roles,
        }
    }
}

fn role_list(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

const USER_COLUMNS: &str = "id, email, hash, roles";
const ENTRY_COLUMNS: &str = "id, user_id, title, description, date, value, recurrence";
const GOAL_COLUMNS: &str = "id, user_id, description, value, limit_date";

impl Store for SqliteStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "
                INSERT INTO users (email, hash, roles)
                VALUES (?1, ?2, ?3)
                RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&user.email)
        .bind(&user.hash)
        .bind(role_list(&user.roles))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_user(&self, key: &UserKey) -> StoreResult<Option<User>> {
        let sql = match key {
            UserKey::Id(_) => format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            UserKey::Email(_) => format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        };
        let query = sqlx::query_as::<_, UserRow>(&sql);
        let query = match key {
            UserKey::Id(id) => query.bind(*id),
            UserKey::Email(email) => query.bind(email.as_str()),
        };

        Ok(query.fetch_optional(&self.pool).await?.map(User::from))
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "
                SELECT {USER_COLUMNS} FROM users
                ORDER BY id
                LIMIT ?1 OFFSET ?2
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
                    email = ?2,
                    hash = ?3,
                    roles = ?4
                WHERE id = ?1
                RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.hash)
        .bind(role_list(&user.roles))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn delete_user(&self, key: &UserKey) -> StoreResult<bool> {
        let result = match key {
            UserKey::Id(id) => {
                sqlx::query("DELETE FROM users WHERE id = ?1")
                    .bind(*id)
                    .execute(&self.pool)
                    .await?
            }
            UserKey::Email(email) => {
                sqlx::query("DELETE FROM users WHERE email = ?1")
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
                WHERE (?1 IS NULL OR id = ?1)
                    AND (?2 IS NULL OR user_id = ?2)
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
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
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
        .await?;

        Ok(entry)
    }

    async fn save_entry(&self, kind: EntryKind, entry: &Entry) -> StoreResult<Option<Entry>> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "
                UPDATE {table} SET
                    title = ?2,
                    description = ?3,
                    date = ?4,
                    value = ?5,
                    recurrence = ?6
                WHERE id = ?1
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
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_goals(&self, filter: Filter) -> StoreResult<Vec<FinancialGoal>> {
        let goals = sqlx::query_as::<_, FinancialGoal>(&format!(
            "
                SELECT {GOAL_COLUMNS} FROM financial_goals
                WHERE (?1 IS NULL OR id = ?1)
                    AND (?2 IS NULL OR user_id = ?2)
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
                ) VALUES (?1, ?2, ?3, ?4)
                RETURNING {GOAL_COLUMNS}
            "
        ))
        .bind(owner_id)
        .bind(&goal.description)
        .bind(goal.value)
        .bind(goal.limit_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(goal)
    }

    async fn save_goal(&self, goal: &FinancialGoal) -> StoreResult<Option<FinancialGoal>> {
        let goal = sqlx::query_as::<_, FinancialGoal>(&format!(
            "
                UPDATE financial_goals SET
                    description = ?2,
                    value = ?3,
                    limit_date = ?4
                WHERE id = ?1
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
        let result = sqlx::query("DELETE FROM financial_goals WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use chrono::NaiveDate;

    async fn store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            hash: "hash".to_string(),
            roles: vec![Role::User],
        }
    }

    fn new_entry(title: &str, day: u32) -> NewEntry {
        NewEntry {
            title: title.to_string(),
            description: format!("{} description", title),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            value: 10.0,
            recurrence: None,
        }
    }

    #[tokio::test]
    async fn test_insert_user_rejects_duplicate_email() {
        let store = store().await;
        let first = store.insert_user(new_user("a@x.com")).await.unwrap();
        assert_eq!(first.id, 1);

        let err = store.insert_user(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
    }

    #[tokio::test]
    async fn test_roles_survive_a_round_trip() {
        let store = store().await;
        let mut user = store
            .insert_user(NewUser {
                roles: vec![Role::User, Role::Admin],
                ..new_user("a@x.com")
            })
            .await
            .unwrap();
        assert_eq!(user.roles, vec![Role::User, Role::Admin]);

        user.roles = vec![Role::Admin];
        store.save_user(&user).await.unwrap();
        let stored = store
            .find_user(&UserKey::Email("a@x.com".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.roles, vec![Role::Admin]);
    }

    #[tokio::test]
    async fn test_save_user_rejects_email_of_another_user() {
        let store = store().await;
        store.insert_user(new_user("a@x.com")).await.unwrap();
        let mut second = store.insert_user(new_user("b@x.com")).await.unwrap();

        second.email = "a@x.com".to_string();
        let err = store.save_user(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));

        second.id = 999;
        second.email = "c@x.com".to_string();
        assert!(store.save_user(&second).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_need_an_existing_owner() {
        let store = store().await;
        let err = store
            .insert_entry(EntryKind::Expense, 42, new_entry("Rent", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation));

        let err = store
            .insert_goal(
                42,
                NewGoal {
                    description: "Car".to_string(),
                    value: 5000.0,
                    limit_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation));
    }

    #[tokio::test]
    async fn test_entry_fields_come_back_unchanged() {
        let store = store().await;
        let user = store.insert_user(new_user("a@x.com")).await.unwrap();
        let entry = store
            .insert_entry(
                EntryKind::Revenue,
                user.id,
                NewEntry {
                    recurrence: Some(30),
                    ..new_entry("Salary", 25)
                },
            )
            .await
            .unwrap();

        assert_eq!(entry.owner_id, user.id);
        assert_eq!(entry.title, "Salary");
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 1, 25).unwrap());
        assert_eq!(entry.value, 10.0);
        assert_eq!(entry.recurrence, Some(30));
    }

    #[tokio::test]
    async fn test_expense_and_revenue_tables_are_separate() {
        let store = store().await;
        let user = store.insert_user(new_user("a@x.com")).await.unwrap();
        store
            .insert_entry(EntryKind::Expense, user.id, new_entry("Rent", 1))
            .await
            .unwrap();

        let revenues = store
            .find_entries(EntryKind::Revenue, Filter::owned_by(user.id))
            .await
            .unwrap();
        assert!(revenues.is_empty());
    }

    #[tokio::test]
    async fn test_filter_by_id_and_owner() {
        let store = store().await;
        let owner = store.insert_user(new_user("a@x.com")).await.unwrap();
        let other = store.insert_user(new_user("b@x.com")).await.unwrap();
        let entry = store
            .insert_entry(EntryKind::Expense, owner.id, new_entry("Rent", 1))
            .await
            .unwrap();

        let mine = store
            .find_entries(EntryKind::Expense, Filter::owned_by(owner.id).with_id(entry.id))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);

        let theirs = store
            .find_entries(EntryKind::Expense, Filter::owned_by(other.id).with_id(entry.id))
            .await
            .unwrap();
        assert!(theirs.is_empty());
    }

    #[tokio::test]
    async fn test_entries_are_newest_first() {
        let store = store().await;
        let user = store.insert_user(new_user("a@x.com")).await.unwrap();
        for (title, day) in [("old", 1), ("new", 20), ("mid", 10)] {
            store
                .insert_entry(EntryKind::Expense, user.id, new_entry(title, day))
                .await
                .unwrap();
        }

        let titles: Vec<String> = store
            .find_entries(EntryKind::Expense, Filter::owned_by(user.id))
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.title)
            .collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let store = store().await;
        let keep = store.insert_user(new_user("keep@x.com")).await.unwrap();
        let gone = store.insert_user(new_user("gone@x.com")).await.unwrap();
        for owner in [keep.id, gone.id] {
            store
                .insert_entry(EntryKind::Expense, owner, new_entry("Rent", 1))
                .await
                .unwrap();
            store
                .insert_entry(EntryKind::Revenue, owner, new_entry("Salary", 1))
                .await
                .unwrap();
        }

        assert!(store.delete_user(&UserKey::Email("gone@x.com".into())).await.unwrap());
        assert!(!store.delete_user(&UserKey::Id(gone.id)).await.unwrap());

        for kind in [EntryKind::Expense, EntryKind::Revenue] {
            let all = store.find_entries(kind, Filter::default()).await.unwrap();
            assert_eq!(all.len(), 1);
            assert_eq!(all[0].owner_id, keep.id);
        }
    }

    #[tokio::test]
    async fn test_save_entry_keeps_owner() {
        let store = store().await;
        let user = store.insert_user(new_user("a@x.com")).await.unwrap();
        let mut entry = store
            .insert_entry(EntryKind::Expense, user.id, new_entry("Rent", 1))
            .await
            .unwrap();

        entry.owner_id = 999;
        entry.title = "Mortgage".to_string();
        entry.recurrence = Some(7);
        let saved = store
            .save_entry(EntryKind::Expense, &entry)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.owner_id, user.id);
        assert_eq!(saved.title, "Mortgage");
        assert_eq!(saved.recurrence, Some(7));

        entry.id = 999;
        assert!(store.save_entry(EntryKind::Expense, &entry).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_paginates_by_id() {
        let store = store().await;
        for n in 0..5 {
            store.insert_user(new_user(&format!("u{}@x.com", n))).await.unwrap();
        }

        let page: Vec<i64> = store
            .list_users(2, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|user| user.id)
            .collect();
        assert_eq!(page, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_clones_share_one_database() {
        let store = store().await;
        let clone = store.clone();
        store.insert_user(new_user("a@x.com")).await.unwrap();

        let found = clone
            .find_user(&UserKey::Email("a@x.com".to_string()))
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
