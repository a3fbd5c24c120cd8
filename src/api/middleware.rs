//! Page cache middleware.
//!
//! Wraps admin page rendering: serves stored pages, captures fresh renders,
//! and answers prefetch probes. The engine decides; this layer translates
//! between HTTP and the engine.

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST, SET_COOKIE},
        HeaderMap, HeaderValue, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tracing::{instrument, warn};

use super::handlers::AppState;
use crate::cache::{sanitize_token, Captured, Decision, PageRequest};

/// Cookie carrying the cache session token.
pub const SESSION_COOKIE: &str = "admin-cache-session";
/// Marks a request as a prefetch probe.
pub const PREFETCH_HEADER: &str = "x-admin-cache-prefetch";
pub const NONCE_HEADER: &str = "x-admin-cache-nonce";
/// Forces a fresh render even when a stored copy exists.
pub const REFRESH_HEADER: &str = "x-admin-cache-refresh";
/// Cookie remembering the interface language pages were rendered in.
pub const LANG_COOKIE: &str = "admin-cache-lang";

/// Request extension inserted by upstream authentication for callers with
/// operator rights.
#[derive(Debug, Clone, Copy)]
pub struct OperatorPrivilege;

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let snapshot = state.settings.current();
    let page_request = page_request(&request);

    // Pages rendered in the previous language are stale for this session
    let switched_lang = language_switch(&request);
    if switched_lang.is_some() {
        if let Some(token) = page_request.session.as_deref().and_then(sanitize_token) {
            state.engine.purge().purge_session(&token).await;
        }
    }

    let mut response = match state.engine.begin(&snapshot, &page_request).await {
        Decision::Passthrough(_) => next.run(request).await,
        Decision::Serve(page) => html_response(page),
        Decision::Prefetched { remaining_secs } => prefetch_ack(remaining_secs),
        Decision::Reject(err) => err.into_response(),
        Decision::Capture(ticket) => {
            let response = next.run(request).await;
            let (mut parts, body) = response.into_parts();
            // Collected whole; the engine refuses pages too large to store
            let bytes = match axum::body::to_bytes(body, usize::MAX).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(key = ticket.key(), error = %err, "Rendered body unreadable");
                    return StatusCode::BAD_GATEWAY.into_response();
                }
            };
            match state.engine.finish(ticket, parts.status, bytes).await {
                Captured::Page(page) | Captured::Uncached(page) => {
                    parts.headers.remove(CONTENT_LENGTH);
                    Response::from_parts(parts, Body::from(page))
                }
                Captured::PrefetchAck { ttl_secs } => prefetch_ack(ttl_secs),
            }
        }
    };

    if let Some(lang) = switched_lang {
        let cookie = format!("{LANG_COOKIE}={lang}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

/// Reads what the engine needs out of the HTTP request.
pub fn page_request(request: &Request<Body>) -> PageRequest {
    let headers = request.headers();
    PageRequest {
        full_url: full_url(request),
        mutating: ![Method::GET, Method::HEAD, Method::OPTIONS].contains(request.method()),
        session: session_cookie(headers),
        prefetch: flag(headers, PREFETCH_HEADER),
        nonce: headers
            .get(NONCE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        refresh: flag(headers, REFRESH_HEADER),
        privileged: request.extensions().get::<OperatorPrivilege>().is_some(),
    }
}

/// The raw session cookie value, if sent.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    cookie(headers, SESSION_COOKIE)
}

fn cookie(headers: &HeaderMap, wanted: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == wanted)
        .map(|(_, value)| value.to_string())
}

/// The `lang` query value when it differs from the remembered language.
fn language_switch(request: &Request<Body>) -> Option<String> {
    let lang: String = request
        .uri()
        .query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "lang")?
        .1
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(16)
        .collect();
    if lang.is_empty() {
        return None;
    }
    let current = cookie(request.headers(), LANG_COOKIE);
    (current.as_deref() != Some(lang.as_str())).then_some(lang)
}

fn flag(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "1")
}

fn full_url(request: &Request<Body>) -> String {
    let uri = request.uri();
    if uri.authority().is_some() {
        return uri.to_string();
    }
    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("http://{host}{path}")
}

fn html_response(page: Bytes) -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))],
        page,
    )
        .into_response()
}

fn prefetch_ack(secs: u64) -> Response {
    (
        [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        format!("prefetched:{secs}"),
    )
        .into_response()
}
