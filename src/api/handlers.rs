//! API Handlers
//!
//! HTTP request handlers for the operator endpoints and the admin pages the
//! cache wraps.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, Uri},
    response::Html,
    Json,
};
use tracing::info;

use super::middleware::session_cookie;
use crate::cache::{
    sanitize_token, CacheEngine, NonceIssuer, PageStore, PurgeScope, Registry, RetryPolicy,
    StoreLock, TtlStore,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    EventResponse, HealthResponse, PrefetchResponse, PurgeRequest, PurgeResponse,
    SettingsResponse, StatsResponse,
};
use crate::rules::prefetch_urls;
use crate::settings::{Settings, SettingsHandle};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<SettingsHandle>,
    pub engine: Arc<CacheEngine>,
    /// The in-memory store behind the engine, kept for sweeps and stats.
    pub store: Arc<RwLock<TtlStore>>,
}

impl AppState {
    /// Wires the store, registry and engine described by `config`.
    pub fn new(settings: SettingsHandle, config: &Config) -> Self {
        let store = Arc::new(RwLock::new(TtlStore::new(config.max_entries)));
        let page_store: Arc<dyn PageStore> = store.clone();
        let retry = RetryPolicy {
            attempts: config.lock_retries,
            backoff: config.lock_backoff(),
        };
        let registry = Arc::new(Registry::new(
            page_store.clone(),
            Arc::new(StoreLock::new(page_store.clone())),
            retry,
        ));
        let engine = CacheEngine::new(
            page_store,
            registry,
            NonceIssuer::new(config.nonce_secret.clone()),
            config.admin_root_url.clone(),
        )
        .with_reconcile_every(config.reconcile_every);

        Self {
            settings: Arc::new(settings),
            engine: Arc::new(engine),
            store,
        }
    }
}

/// Handler for POST /admin-cache/purge
pub async fn purge_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PurgeRequest>,
) -> Result<Json<PurgeResponse>> {
    let cookie = session_cookie(&headers);
    let target = req
        .target_session(cookie.as_deref())
        .map_err(CacheError::InvalidRequest)?;

    let purge = state.engine.purge();
    let report = match (req.scope, target) {
        (PurgeScope::Session, Some(token)) => purge.purge_session(&token).await,
        _ => purge.purge_all().await,
    };
    Ok(Json(report))
}

/// Handler for GET /admin-cache/settings
pub async fn get_settings_handler(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(SettingsResponse::from(state.settings.current().as_ref()))
}

/// Handler for PUT /admin-cache/settings
pub async fn put_settings_handler(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<Json<SettingsResponse>> {
    let snapshot = state.settings.replace(settings).await?;
    Ok(Json(SettingsResponse::from(snapshot.as_ref())))
}

/// Handler for POST /admin-cache/events/:name
pub async fn event_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Json<EventResponse> {
    let snapshot = state.settings.current();
    let session = session_cookie(&headers).and_then(|raw| sanitize_token(&raw));
    let purge = state
        .engine
        .purge()
        .on_event(&name, session.as_deref(), &snapshot.settings)
        .await;
    Json(EventResponse { event: name, purge })
}

/// Handler for GET /admin-cache/prefetch
///
/// Gives the caller's session a nonce and the pages worth warming.
pub async fn prefetch_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PrefetchResponse>> {
    let token = session_cookie(&headers)
        .and_then(|raw| sanitize_token(&raw))
        .ok_or_else(|| CacheError::InvalidRequest("No session token".to_string()))?;
    let snapshot = state.settings.current();
    Ok(Json(PrefetchResponse {
        nonce: state.engine.nonces().issue(&token),
        urls: prefetch_urls(&snapshot, state.engine.admin_root()),
    }))
}

/// Handler for GET /admin-cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let registered = state.engine.registry().list().await.len();
    let total_entries = state.store.read().await.len();
    Json(StatsResponse::new(
        state.engine.stats(),
        registered,
        total_entries,
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Renders an admin screen. Stands in for the host application behind the
/// cache layer.
pub async fn admin_page_handler(method: Method, uri: Uri) -> Html<String> {
    let rendered_at = chrono::Utc::now().to_rfc3339();
    if method != Method::GET && method != Method::HEAD {
        info!(path = %uri.path(), "Admin form submitted");
    }
    Html(format!(
        "<!DOCTYPE html>\n<html><head><title>{path}</title></head><body>\
         <h1>{path}</h1><p>Rendered at {rendered_at}</p></body></html>",
        path = uri.path()
    ))
}
