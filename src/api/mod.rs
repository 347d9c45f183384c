//! REST API: routes, extractors, errors and security middleware.

mod error;
mod extract;
mod handlers;
pub mod middleware;
mod state;

pub use error::{AppError, ErrorBody, SuccessBody};
pub use handlers::{LeaderboardQuery, MigrateResponse};
pub use middleware::{RateLimiter, SecurityConfig, ROLE_HEADER};
pub use state::AppState;

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::models::Role;
use middleware::{
    auth_middleware, rate_limit_middleware, require_role, RoleGuard, ADMIN_ONLY, ANY_ROLE, STAFF,
};

/// Router with security settings taken from the environment.
pub fn create_router(state: AppState) -> Router {
    create_router_with_config(state, SecurityConfig::from_env())
}

pub fn create_router_with_config(state: AppState, config: SecurityConfig) -> Router {
    let enforce = config.enforce_roles;
    let guard = |route: MethodRouter<AppState>, allowed: &'static [Role]| {
        route.route_layer(from_fn_with_state(
            RoleGuard::new(allowed, enforce),
            require_role,
        ))
    };

    let mut api = Router::new()
        // Subjects
        .route(
            "/subjects",
            get(handlers::list_subjects).merge(guard(post(handlers::create_subject), STAFF)),
        )
        .route(
            "/subjects/{id}",
            get(handlers::get_subject).merge(guard(
                put(handlers::update_subject).delete(handlers::delete_subject),
                STAFF,
            )),
        )
        .route(
            "/subjects/{id}/chapters",
            get(handlers::list_chapters).merge(guard(post(handlers::create_chapter), STAFF)),
        )
        // Chapters
        .route(
            "/chapters/{id}",
            get(handlers::get_chapter).merge(guard(
                put(handlers::update_chapter).delete(handlers::delete_chapter),
                STAFF,
            )),
        )
        .route(
            "/chapters/{id}/topics",
            get(handlers::list_topics).merge(guard(post(handlers::create_topic), STAFF)),
        )
        .route(
            "/chapters/{id}/outcomes",
            get(handlers::list_outcomes).merge(guard(post(handlers::create_outcome), STAFF)),
        )
        .route(
            "/chapters/{id}/videos",
            get(handlers::list_videos).merge(guard(post(handlers::create_video), STAFF)),
        )
        .route("/chapters/{id}/quiz", post(handlers::chapter_quiz))
        .route("/chapters/{id}/tutor", post(handlers::chapter_tutor))
        // Chapter content (by item id)
        .route(
            "/topics/{id}",
            guard(
                put(handlers::update_topic).delete(handlers::delete_topic),
                STAFF,
            ),
        )
        .route(
            "/outcomes/{id}",
            guard(
                put(handlers::update_outcome).delete(handlers::delete_outcome),
                STAFF,
            ),
        )
        .route(
            "/videos/{id}",
            guard(
                put(handlers::update_video).delete(handlers::delete_video),
                STAFF,
            ),
        )
        // Curriculum import
        .route(
            "/migrate",
            guard(post(handlers::migrate_curriculum), ADMIN_ONLY),
        )
        // Users
        .route(
            "/users",
            get(handlers::list_users).merge(guard(post(handlers::create_user), ADMIN_ONLY)),
        )
        .route(
            "/users/{id}",
            get(handlers::get_user).merge(guard(
                put(handlers::update_user).delete(handlers::delete_user),
                ADMIN_ONLY,
            )),
        )
        // Submissions
        .route(
            "/submissions",
            get(handlers::list_submissions)
                .merge(guard(post(handlers::create_submission), ANY_ROLE)),
        )
        .route(
            "/submissions/{id}",
            get(handlers::get_submission)
                .merge(guard(delete(handlers::delete_submission), STAFF)),
        )
        .route(
            "/submissions/{id}/grade",
            guard(post(handlers::grade_submission), STAFF),
        )
        // Schedule
        .route(
            "/schedule",
            get(handlers::list_events).merge(guard(post(handlers::create_event), STAFF)),
        )
        .route(
            "/schedule/{id}",
            get(handlers::get_event).merge(guard(
                put(handlers::update_event).delete(handlers::delete_event),
                STAFF,
            )),
        )
        // Flows and dashboard
        .route("/flows/quiz", post(handlers::generate_quiz))
        .route("/flows/tutor", post(handlers::tutor))
        .route("/leaderboard", get(handlers::leaderboard))
        .route_layer(from_fn_with_state(config.clone(), auth_middleware));

    if let Some(limiter) = config.rate_limiter.clone() {
        api = api.route_layer(from_fn_with_state(limiter, rate_limit_middleware));
    }

    // Health stays reachable without a key
    let api = api.route("/health", get(handlers::health));

    Router::new()
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config)),
        )
        .with_state(state)
}

fn cors_layer(config: &SecurityConfig) -> CorsLayer {
    let Some(origins) = &config.cors_origins else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
