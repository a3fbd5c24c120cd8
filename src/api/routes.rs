//! API Routes
//!
//! Configures the Axum router: operator endpoints under `/admin-cache`, and
//! every other path rendered as an admin page behind the page cache.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    admin_page_handler, event_handler, get_settings_handler, health_handler, prefetch_handler,
    purge_handler, put_settings_handler, stats_handler, AppState,
};
use super::middleware::page_cache_layer;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /admin-cache/purge` - Purge site-wide or one session
/// - `GET|PUT /admin-cache/settings` - Read or replace the settings document
/// - `POST /admin-cache/events/:name` - Fire a purge-bound event
/// - `GET /admin-cache/prefetch` - Nonce and URL list for cache warming
/// - `GET /admin-cache/stats` - Engine statistics
/// - `GET /health` - Health check endpoint
/// - anything else - Admin pages, through the page cache
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let control = Router::new()
        .route("/purge", post(purge_handler))
        .route(
            "/settings",
            get(get_settings_handler).put(put_settings_handler),
        )
        .route("/events/:name", post(event_handler))
        .route("/prefetch", get(prefetch_handler))
        .route("/stats", get(stats_handler));

    let pages = Router::new()
        .fallback(admin_page_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            page_cache_layer,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/admin-cache", control)
        .merge(pages)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::settings::{Settings, SettingsHandle};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let settings = SettingsHandle::new(Settings::default());
        create_router(AppState::new(settings, &Config::default()))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin-cache/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_page_renders() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/wp-admin/index.php")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_purge_scope() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/admin-cache/purge")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"scope":"galaxy"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
