use std::sync::Arc;

use axum::{
    Extension, Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    AppState,
    auth::{ADMIN_ONLY, Access, Guard, require_access},
    domain::EntryKind,
    handlers::{self, entries, goals, users},
    store::Store,
};

fn entry_routes<S: Store>(kind: EntryKind) -> Router<Arc<AppState<S>>> {
    Router::new()
        .route(kind.path(), get(entries::list::<S>).post(entries::create::<S>))
        .route(
            &format!("{}/{{id}}", kind.path()),
            patch(entries::update::<S>).delete(entries::remove::<S>),
        )
        .layer(Extension(kind))
}

fn goal_routes<S: Store>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route(
            "/financial-goal",
            get(goals::list::<S>).post(goals::create::<S>),
        )
        .route(
            "/financial-goal/{id}",
            patch(goals::update::<S>).delete(goals::remove::<S>),
        )
}

fn user_routes<S: Store>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/users", get(users::list::<S>).post(users::create::<S>))
        .route(
            "/users/{id}",
            get(users::get_by_id::<S>)
                .patch(users::update_by_id::<S>)
                .delete(users::delete_by_id::<S>),
        )
        .route(
            "/users/by-email/{email}",
            get(users::get_by_email::<S>)
                .patch(users::update_by_email::<S>)
                .delete(users::delete_by_email::<S>),
        )
}

fn cors(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

/// Assembles the whole API. Each route group declares its [`Access`] once.
pub fn router<S: Store>(state: Arc<AppState<S>>, cors_origin: HeaderValue) -> Router {
    let guard = |access: Access| {
        middleware::from_fn_with_state(Guard::new(state.auth.clone(), access), require_access)
    };

    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/signup", post(handlers::auth::signup::<S>))
        .route("/auth/login", post(handlers::auth::login::<S>))
        .route_layer(guard(Access::Public));

    let owned = entry_routes::<S>(EntryKind::Expense)
        .merge(entry_routes::<S>(EntryKind::Revenue))
        .merge(goal_routes::<S>())
        .route_layer(guard(Access::Authenticated));

    let admin = user_routes::<S>().route_layer(guard(ADMIN_ONLY));

    Router::new()
        .merge(public)
        .merge(owned)
        .merge(admin)
        .fallback(handlers::fallback)
        .layer(TraceLayer::new_for_http())
        .layer(cors(cors_origin))
        .with_state(state)
}
