use crate::{
    auth::Auth,
    contract::{CreateUserRequest, Pagination, SignupRequest, UpdateUserRequest, Validate},
    domain::{NewUser, Role, User, UserKey, role_set},
    error::AppError,
    store::{Store, StoreError},
};

fn email_taken() -> AppError {
    AppError::Conflict("Email address is already registered".to_string())
}

fn user_not_found() -> AppError {
    AppError::NotFound("Requested user does not exist".to_string())
}

fn unique_email(err: StoreError) -> AppError {
    match err {
        StoreError::UniqueViolation => email_taken(),
        other => other.into(),
    }
}

pub async fn create_user<S: Store>(
    store: &S,
    auth: &Auth,
    email: String,
    password: &str,
    roles: Vec<Role>,
) -> Result<User, AppError> {
    if store.find_user(&UserKey::Email(email.clone())).await?.is_some() {
        return Err(email_taken());
    }

    let hash = auth.hash_password(password).await?;
    let user = store
        .insert_user(NewUser {
            email,
            hash,
            roles: role_set(roles),
        })
        .await
        .map_err(unique_email)?;

    tracing::info!("Created user id={} roles={:?}", user.id, user.roles);
    Ok(user)
}

pub async fn signup<S: Store>(
    store: &S,
    auth: &Auth,
    request: SignupRequest,
) -> Result<User, AppError> {
    create_user(store, auth, request.email, &request.password, vec![Role::User]).await
}

/// Returns a signed token for valid credentials.
pub async fn login<S: Store>(
    store: &S,
    auth: &Auth,
    email: &str,
    password: &str,
) -> Result<String, AppError> {
    let user = find_user(store, &UserKey::Email(email.to_string())).await?;

    if !auth.verify_password(password, &user.hash).await? {
        tracing::info!("Failed login for user id={}", user.id);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    auth.issue_token(&user)
}

pub async fn admin_create_user<S: Store>(
    store: &S,
    auth: &Auth,
    request: CreateUserRequest,
) -> Result<User, AppError> {
    let roles = request.roles.unwrap_or_else(|| vec![Role::User]);
    create_user(store, auth, request.email, &request.password, roles).await
}

pub async fn find_user<S: Store>(store: &S, key: &UserKey) -> Result<User, AppError> {
    store.find_user(key).await?.ok_or_else(user_not_found)
}

pub async fn list_users<S: Store>(store: &S, page: Pagination) -> Result<Vec<User>, AppError> {
    Ok(store.list_users(page.limit(), page.offset()).await?)
}

pub async fn update_user<S: Store>(
    store: &S,
    auth: &Auth,
    key: &UserKey,
    request: UpdateUserRequest,
) -> Result<User, AppError> {
    let mut user = find_user(store, key).await?;

    if let Some(email) = request.email {
        if email != user.email && store.find_user(&UserKey::Email(email.clone())).await?.is_some()
        {
            return Err(email_taken());
        }
        user.email = email;
    }
    if let Some(password) = request.password {
        user.hash = auth.hash_password(&password).await?;
    }
    if let Some(roles) = request.roles {
        user.roles = role_set(roles);
    }

    let user = store
        .save_user(&user)
        .await
        .map_err(unique_email)?
        .ok_or_else(user_not_found)?;

    tracing::info!("Updated user id={}", user.id);
    Ok(user)
}

pub async fn delete_user<S: Store>(store: &S, key: &UserKey) -> Result<(), AppError> {
    if !store.delete_user(key).await? {
        return Err(user_not_found());
    }

    tracing::info!("Deleted user {} and everything it owned", key);
    Ok(())
}

/// Makes sure an administrator account exists. Returns `true` when one was created.
pub async fn ensure_admin<S: Store>(
    store: &S,
    auth: &Auth,
    email: &str,
    password: &str,
) -> Result<bool, AppError> {
    if let Some(existing) = store.find_user(&UserKey::Email(email.to_string())).await? {
        if !existing.has_role(Role::Admin) {
            tracing::warn!(
                "Bootstrap admin email={} already exists without the Admin role",
                email
            );
        }
        return Ok(false);
    }

    let request = SignupRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    request.validate()?;

    create_user(
        store,
        auth,
        request.email,
        &request.password,
        vec![Role::User, Role::Admin],
    )
    .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::test_auth, store::SqliteStore};

    const PASSWORD: &str = "Abc12345!";

    fn signup_request(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: PASSWORD.to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_then_duplicate_conflicts() {
        let store = SqliteStore::in_memory().await.unwrap();
        let auth = test_auth();

        let user = signup(&store, &auth, signup_request("a@x.com")).await.unwrap();
        assert_eq!(user.roles, vec![Role::User]);
        assert_ne!(user.hash, PASSWORD);

        let err = signup(&store, &auth, signup_request("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_outcomes() {
        let store = SqliteStore::in_memory().await.unwrap();
        let auth = test_auth();
        let user = signup(&store, &auth, signup_request("a@x.com")).await.unwrap();

        let token = login(&store, &auth, "a@x.com", PASSWORD).await.unwrap();
        assert!(!token.is_empty());
        assert_eq!(auth.verify_token(&token).unwrap().sub, user.id);

        let err = login(&store, &auth, "a@x.com", "fjkdljf").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = login(&store, &auth, "nobody@x.com", "jntogvn").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_user_changes_only_given_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        let auth = test_auth();
        let user = signup(&store, &auth, signup_request("a@x.com")).await.unwrap();

        let updated = update_user(
            &store,
            &auth,
            &UserKey::Id(user.id),
            UpdateUserRequest {
                roles: Some(vec![Role::Admin, Role::User, Role::Admin]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.email, "a@x.com");
        assert_eq!(updated.hash, user.hash);
        assert_eq!(updated.roles, vec![Role::User, Role::Admin]);
    }

    #[tokio::test]
    async fn test_update_user_password_allows_new_login() {
        let store = SqliteStore::in_memory().await.unwrap();
        let auth = test_auth();
        signup(&store, &auth, signup_request("a@x.com")).await.unwrap();

        update_user(
            &store,
            &auth,
            &UserKey::Email("a@x.com".to_string()),
            UpdateUserRequest {
                password: Some("Xyz98765?".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(login(&store, &auth, "a@x.com", PASSWORD).await.is_err());
        assert!(login(&store, &auth, "a@x.com", "Xyz98765?").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_user_email_conflict() {
        let store = SqliteStore::in_memory().await.unwrap();
        let auth = test_auth();
        signup(&store, &auth, signup_request("a@x.com")).await.unwrap();
        let second = signup(&store, &auth, signup_request("b@x.com")).await.unwrap();

        let err = update_user(
            &store,
            &auth,
            &UserKey::Id(second.id),
            UpdateUserRequest {
                email: Some("a@x.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_missing_users_are_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let auth = test_auth();

        assert!(matches!(
            find_user(&store, &UserKey::Id(5)).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            delete_user(&store, &UserKey::Email("x@x.com".into())).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            update_user(&store, &auth, &UserKey::Id(5), UpdateUserRequest::default()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let auth = test_auth();

        assert!(ensure_admin(&store, &auth, "root@x.com", PASSWORD).await.unwrap());
        assert!(!ensure_admin(&store, &auth, "root@x.com", PASSWORD).await.unwrap());

        let admin = find_user(&store, &UserKey::Email("root@x.com".into())).await.unwrap();
        assert!(admin.has_role(Role::Admin));
        assert_eq!(list_users(&store, Pagination::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_admin_rejects_weak_password() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = ensure_admin(&store, &test_auth(), "root@x.com", "weak")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
