use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{
    domain::{EntryPatch, GoalPatch, NewEntry, NewGoal, Role},
    error::AppError,
};

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;
const MIN_PASSWORD_LENGTH: usize = 8;

pub trait Validate {
    /// Every broken rule, in field order. Empty when the value is acceptable.
    fn problems(&self) -> Vec<String>;

    fn validate(&self) -> Result<(), AppError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(problems))
        }
    }
}

pub fn check_email(email: &str, problems: &mut Vec<String>) {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        problems.push("Invalid email".to_string());
    }
}

pub fn check_password(password: &str, problems: &mut Vec<String>) {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push("Password must be at least 8 characters long".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        problems.push("Password must contain at least one special character".to_string());
    }
}

fn check_text(field: &str, value: &str, problems: &mut Vec<String>) {
    if value.trim().is_empty() {
        problems.push(format!("{} must not be empty", field));
    }
}

fn check_value(value: f64, problems: &mut Vec<String>) {
    if !value.is_finite() || value <= 0.0 {
        problems.push("value must be a positive number".to_string());
    }
}

fn check_recurrence(recurrence: Option<i32>, problems: &mut Vec<String>) {
    if recurrence.is_some_and(|days| days <= 0) {
        problems.push("recurrence must be a positive number of days".to_string());
    }
}

fn check_roles(roles: &[Role], problems: &mut Vec<String>) {
    if roles.is_empty() {
        problems.push("roles must contain at least one role".to_string());
    }
}

/// Body of `POST /auth/signup`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

impl Validate for SignupRequest {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        check_email(&self.email, &mut problems);
        check_password(&self.password, &mut problems);
        problems
    }
}

/// Body of `POST /auth/login`. Password strength is not re-checked here, a weak
/// password simply fails to match.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        check_email(&self.email, &mut problems);
        if self.password.is_empty() {
            problems.push("Password must not be empty".to_string());
        }
        problems
    }
}

/// Body of `POST /users`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub roles: Option<Vec<Role>>,
}

impl Validate for CreateUserRequest {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        check_email(&self.email, &mut problems);
        check_password(&self.password, &mut problems);
        if let Some(roles) = &self.roles {
            check_roles(roles, &mut problems);
        }
        problems
    }
}

/// Body of `PATCH /users/...`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub roles: Option<Vec<Role>>,
}

impl Validate for UpdateUserRequest {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(email) = &self.email {
            check_email(email, &mut problems);
        }
        if let Some(password) = &self.password {
            check_password(password, &mut problems);
        }
        if let Some(roles) = &self.roles {
            check_roles(roles, &mut problems);
        }
        problems
    }
}

impl Validate for NewEntry {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        check_text("title", &self.title, &mut problems);
        check_value(self.value, &mut problems);
        check_recurrence(self.recurrence, &mut problems);
        problems
    }
}

impl Validate for EntryPatch {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(title) = &self.title {
            check_text("title", title, &mut problems);
        }
        if let Some(value) = self.value {
            check_value(value, &mut problems);
        }
        check_recurrence(self.recurrence.flatten(), &mut problems);
        problems
    }
}

impl Validate for NewGoal {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        check_text("description", &self.description, &mut problems);
        check_value(self.value, &mut problems);
        problems
    }
}

impl Validate for GoalPatch {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(description) = &self.description {
            check_text("description", description, &mut problems);
        }
        if let Some(value) = self.value {
            check_value(value, &mut problems);
        }
        problems
    }
}

/// Query string of `GET /users`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}

impl Validate for Pagination {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(1..=MAX_PAGE_LIMIT).contains(&self.limit()) {
            problems.push(format!("limit must be between 1 and {}", MAX_PAGE_LIMIT));
        }
        if self.offset() < 0 {
            problems.push("offset must not be negative".to_string());
        }
        problems
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub message: String,
    pub token: String,
}

/// Builds the `{message, <key>: data}` success envelope.
pub fn envelope<T: Serialize>(
    message: impl Into<String>,
    key: &str,
    data: T,
) -> Result<Json<Value>, AppError> {
    let mut body = Map::new();
    body.insert("message".to_string(), Value::String(message.into()));
    body.insert(key.to_string(), serde_json::to_value(data)?);
    Ok(Json(Value::Object(body)))
}

/// JSON body that has been deserialised and passed [`Validate`].
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::invalid(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string that has been deserialised and passed [`Validate`].
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::invalid(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Positive integer `{id}` path parameter.
#[derive(Debug, Clone, Copy)]
pub struct ResourceId(pub i64);

impl<S> FromRequestParts<S> for ResourceId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::invalid("id must be a positive integer"))?;
        if id <= 0 {
            return Err(AppError::invalid("id must be a positive integer"));
        }
        Ok(Self(id))
    }
}

/// `{email}` path parameter holding a well-formed address.
#[derive(Debug, Clone)]
pub struct EmailParam(pub String);

impl<S> FromRequestParts<S> for EmailParam
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(email) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::invalid(rejection.body_text()))?;

        let mut problems = Vec::new();
        check_email(&email, &mut problems);
        if !problems.is_empty() {
            return Err(AppError::Validation(problems));
        }
        Ok(Self(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn email_ok(email: &str) -> bool {
        let mut problems = Vec::new();
        check_email(email, &mut problems);
        problems.is_empty()
    }

    #[test]
    fn test_email_rules() {
        assert!(email_ok("a@x.com"));
        assert!(email_ok("first.last@mail.example.org"));
        assert!(!email_ok("a@x"));
        assert!(!email_ok("@x.com"));
        assert!(!email_ok("a@@x.com"));
        assert!(!email_ok("a b@x.com"));
        assert!(!email_ok("a@x.com."));
        assert!(!email_ok("plain"));
    }

    #[test]
    fn test_strong_password_passes() {
        let mut problems = Vec::new();
        check_password("Abc12345!", &mut problems);
        assert!(problems.is_empty(), "{:?}", problems);
    }

    #[test]
    fn test_weak_password_reports_every_rule() {
        let mut problems = Vec::new();
        check_password("abc", &mut problems);
        assert_eq!(
            problems,
            vec![
                "Password must be at least 8 characters long",
                "Password must contain at least one uppercase letter",
                "Password must contain at least one number",
                "Password must contain at least one special character",
            ]
        );
    }

    #[test]
    fn test_login_does_not_enforce_strength() {
        let request = LoginRequest {
            email: "a@x.com".to_string(),
            password: "weak".to_string(),
        };
        assert!(request.validate().is_ok());

        let signup = SignupRequest {
            email: "a@x.com".to_string(),
            password: "weak".to_string(),
        };
        assert!(signup.validate().is_err());
    }

    #[test]
    fn test_new_entry_rules() {
        let entry = NewEntry {
            title: " ".to_string(),
            description: "ok".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            value: -3.0,
            recurrence: Some(0),
        };
        assert_eq!(
            entry.problems(),
            vec![
                "title must not be empty",
                "value must be a positive number",
                "recurrence must be a positive number of days",
            ]
        );
    }

    #[test]
    fn test_empty_patches_are_valid() {
        assert!(EntryPatch::default().validate().is_ok());
        assert!(GoalPatch::default().validate().is_ok());
        assert!(UpdateUserRequest::default().validate().is_ok());
    }

    #[test]
    fn test_description_is_optional() {
        let entry: NewEntry =
            serde_json::from_str(r#"{"title":"Rent","value":1000,"date":"2024-01-01"}"#).unwrap();
        assert_eq!(entry.description, "");
        assert!(entry.validate().is_ok());

        let patch = EntryPatch {
            description: Some(String::new()),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn test_new_entry_rejects_malformed_date() {
        let parsed = serde_json::from_str::<NewEntry>(
            r#"{"title":"Rent","description":"Flat","date":"01/01/2024","value":1000}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_pagination_defaults_and_bounds() {
        let default = Pagination::default();
        assert_eq!(default.limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(default.offset(), 0);
        assert!(default.validate().is_ok());

        let bad = Pagination {
            limit: Some(0),
            offset: Some(-1),
        };
        assert_eq!(bad.problems().len(), 2);
    }

    #[test]
    fn test_update_user_rejects_empty_role_set() {
        let request = UpdateUserRequest {
            roles: Some(Vec::new()),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_envelope_shape() {
        let Json(body) = envelope("done", "items", vec![1, 2]).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "done", "items": [1, 2] }));
    }
}
