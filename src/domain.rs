use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(Role::User),
            "Admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// Sorts and deduplicates a role list so it behaves as a set.
pub fn role_set(mut roles: Vec<Role>) -> Vec<Role> {
    roles.sort();
    roles.dedup();
    roles
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub hash: String,
    pub roles: Vec<Role>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hash: String,
    pub roles: Vec<Role>,
}

/// Public shape of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub roles: Vec<Role>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            roles: user.roles,
        }
    }
}

/// Identifies a single user either by id or by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserKey {
    Id(i64),
    Email(String),
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKey::Id(id) => write!(f, "id={}", id),
            UserKey::Email(email) => write!(f, "email={}", email),
        }
    }
}

/// Expenses and revenues share one record shape and live in separate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Expense,
    Revenue,
}

impl EntryKind {
    pub fn table(&self) -> &'static str {
        match self {
            EntryKind::Expense => "expenses",
            EntryKind::Revenue => "revenues",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            EntryKind::Expense => "/expense",
            EntryKind::Revenue => "/revenue",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Expense => "Expense",
            EntryKind::Revenue => "Revenue",
        }
    }

    /// JSON key for a single record in response envelopes.
    pub fn noun(&self) -> &'static str {
        match self {
            EntryKind::Expense => "expense",
            EntryKind::Revenue => "revenue",
        }
    }

    /// JSON key for a list of records in response envelopes.
    pub fn plural(&self) -> &'static str {
        match self {
            EntryKind::Expense => "expenses",
            EntryKind::Revenue => "revenues",
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Entry {
    pub id: i64,
    #[sqlx(rename = "user_id")]
    pub owner_id: i64,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub value: f64,
    pub recurrence: Option<i32>,
}

impl Entry {
    pub fn apply(&mut self, patch: EntryPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(value) = patch.value {
            self.value = value;
        }
        if let Some(recurrence) = patch.recurrence {
            self.recurrence = recurrence;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    pub value: f64,
    pub recurrence: Option<i32>,
}

/// Partial update. `recurrence: null` clears the interval, an absent key keeps it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "present")]
    pub recurrence: Option<Option<i32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub value: f64,
    pub recurrence: Option<i32>,
}

impl From<Entry> for EntryView {
    fn from(entry: Entry) -> Self {
        Self {
            id: entry.id,
            title: entry.title,
            description: entry.description,
            date: entry.date,
            value: entry.value,
            recurrence: entry.recurrence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FinancialGoal {
    pub id: i64,
    #[sqlx(rename = "user_id")]
    pub owner_id: i64,
    pub description: String,
    pub value: f64,
    pub limit_date: NaiveDate,
}

impl FinancialGoal {
    pub fn apply(&mut self, patch: GoalPatch) {
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(value) = patch.value {
            self.value = value;
        }
        if let Some(limit_date) = patch.limit_date {
            self.limit_date = limit_date;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub description: String,
    pub value: f64,
    pub limit_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPatch {
    pub description: Option<String>,
    pub value: Option<f64>,
    pub limit_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalView {
    pub id: i64,
    pub description: String,
    pub value: f64,
    pub limit_date: NaiveDate,
}

impl From<FinancialGoal> for GoalView {
    fn from(goal: FinancialGoal) -> Self {
        Self {
            id: goal.id,
            description: goal.description,
            value: goal.value,
            limit_date: goal.limit_date,
        }
    }
}

/// Record lookup for entries and goals. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filter {
    pub id: Option<i64>,
    pub owner_id: Option<i64>,
}

impl Filter {
    pub fn owned_by(owner_id: i64) -> Self {
        Self {
            id: None,
            owner_id: Some(owner_id),
        }
    }

    pub fn with_id(self, id: i64) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    pub fn matches(&self, id: i64, owner_id: i64) -> bool {
        self.id.is_none_or(|wanted| wanted == id)
            && self.owner_id.is_none_or(|wanted| wanted == owner_id)
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
