use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Role, User},
    error::AppError,
};

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);
pub const DEFAULT_HASH_COST: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Id of the authenticated user.
    pub sub: i64,
    pub roles: Vec<Role>,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct Auth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
    hash_cost: u32,
}

impl Auth {
    pub fn new(secret: &str, token_ttl: Duration, hash_cost: u32) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            token_ttl,
            hash_cost,
        }
    }

    /// bcrypt is CPU bound, so hashing runs on the blocking pool.
    pub async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.hash_cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| AppError::Internal(format!("Password hashing task failed: {}", err)))?
            .map_err(|err| AppError::Internal(format!("Password hashing failed: {}", err)))
    }

    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|err| AppError::Internal(format!("Password check task failed: {}", err)))?
            .map_err(|err| AppError::Internal(format!("Stored password hash is invalid: {}", err)))
    }

    pub fn issue_token(&self, user: &User) -> Result<String, AppError> {
        let issued_at = Utc::now().timestamp();
        let expires_at = i64::try_from(self.token_ttl.as_secs())
            .ok()
            .and_then(|ttl| issued_at.checked_add(ttl))
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Token lifetime of {}s is out of range",
                    self.token_ttl.as_secs()
                ))
            })?;
        let claims = Claims {
            sub: user.id,
            roles: user.roles.clone(),
            email: user.email.clone(),
            iat: issued_at,
            exp: expires_at,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AppError::Internal(format!("Failed to sign token: {}", err)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!("Rejected token: {}", err);
                AppError::Unauthorized("Invalid authentication token".to_string())
            })
    }
}

/// Who may call a route group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    /// Caller must hold at least one of these roles.
    Roles(&'static [Role]),
}

pub const ADMIN_ONLY: Access = Access::Roles(&[Role::Admin]);

pub fn authorize(access: Access, claims: &Claims) -> Result<(), AppError> {
    match access {
        Access::Public | Access::Authenticated => Ok(()),
        Access::Roles(required) if required.iter().any(|role| claims.roles.contains(role)) => {
            Ok(())
        }
        Access::Roles(_) => Err(AppError::Forbidden(
            "You do not have the required role to access this endpoint".to_string(),
        )),
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.trim().is_empty() => Some(token.trim()),
        _ => None,
    }
}

/// State for one [`require_access`] layer.
#[derive(Clone)]
pub struct Guard {
    auth: Arc<Auth>,
    access: Access,
}

impl Guard {
    pub fn new(auth: Arc<Auth>, access: Access) -> Self {
        Self { auth, access }
    }
}

pub async fn require_access(
    State(guard): State<Guard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if guard.access == Access::Public {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing authentication token".to_string()))?;
    let claims = guard.auth.verify_token(token)?;
    authorize(guard.access, &claims)?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Lowest bcrypt cost, keeps hashing fast in tests.
#[cfg(test)]
pub fn test_auth() -> Auth {
    Auth::new("test-secret", DEFAULT_TOKEN_TTL, 4)
}
