pub mod auth;
pub mod health;
pub mod metrics;
pub mod profiles;
pub mod subscriptions;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Extension, Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{middleware::subscription::require_subscription, AppState};

/// Allow the configured frontend origin, plus localhost for development.
fn cors(app_base_url: &str) -> CorsLayer {
    let base = app_base_url.trim_end_matches('/').to_string();
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        o == base || o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1")
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(origin)
}

pub fn router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/subscriptions/entitlement", get(subscriptions::entitlement))
        .route_layer(from_fn_with_state(state.clone(), require_subscription));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route("/auth/users", get(auth::list_users))
        // Profiles
        .route("/profiles", get(profiles::list_profiles).post(profiles::create_profile))
        .route("/profiles/current", get(profiles::current_profile))
        .route("/profiles/{id}/select", post(profiles::select_profile))
        // Subscriptions
        .route("/subscriptions/my", get(subscriptions::my_subscriptions))
        .route("/subscriptions/subscribe", post(subscriptions::subscribe))
        .route("/subscriptions/{id}", delete(subscriptions::cancel_subscription))
        .merge(gated)
        .layer(Extension(state.tokens.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state.config.app_base_url))
        .with_state(state)
}
