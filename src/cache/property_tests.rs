//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the invariants the page cache relies on.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::cache::{
    embed_timestamp, LocalLock, PageKey, PageStore, PurgeController, Registry, RetryPolicy,
    TtlStore,
};
use crate::rules::{should_cache, without_query, ALWAYS_SKIP};
use crate::settings::{Mode, Settings, Snapshot};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 500;
const ROOT: &str = "https://example.com/wp-admin/";

// == Strategies ==
/// Admin screen paths that no built-in skip entry touches.
fn relative_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,10}\\.php(\\?[a-z]{1,5}=[a-z0-9]{1,5})?"
        .prop_filter("always skipped", |r| !ALWAYS_SKIP.iter().any(|p| r.contains(p)))
}

fn token_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{1,16}"
}

fn full_url(relative: &str) -> String {
    format!("{ROOT}{relative}")
}

fn registry_on(store: Arc<dyn PageStore>) -> Arc<Registry> {
    Arc::new(Registry::new(
        store,
        Arc::new(LocalLock::new()),
        RetryPolicy::default(),
    ))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property 1: Blacklist Membership**
    // *For any* page and deny list, with no regex rules, blacklist mode caches
    // the page exactly when neither its screen nor its exact variant is on the
    // deny list.
    #[test]
    fn prop_blacklist_caches_iff_not_denied(
        relative in relative_strategy(),
        deny in prop::collection::vec(relative_strategy(), 0..8),
        include_page in any::<bool>()
    ) {
        let mut deny_list = deny;
        if include_page {
            deny_list.push(relative.clone());
        }
        let denied = deny_list
            .iter()
            .any(|d| *d == relative || d == without_query(&relative));
        let snapshot = Snapshot::build(Settings {
            enabled: true,
            mode: Mode::Blacklist,
            deny_list,
            ..Settings::default()
        });

        let verdict = should_cache(&relative, &full_url(&relative), &snapshot);
        prop_assert_eq!(verdict.cache, !denied);
    }

    // **Property 2: Strict Whitelist Membership**
    // *For any* page, allow list and regex rules, strict whitelist mode caches
    // the page exactly when its screen or its exact variant is on the allow list.
    #[test]
    fn prop_strict_whitelist_caches_iff_allowed(
        relative in relative_strategy(),
        allow in prop::collection::vec(relative_strategy(), 0..8),
        include_page in any::<bool>(),
        regex_rules in prop::collection::vec("[a-z]{1,4}", 0..3)
    ) {
        let mut allow_list = allow;
        if include_page {
            allow_list.push(relative.clone());
        }
        let allowed = allow_list
            .iter()
            .any(|a| *a == relative || a == without_query(&relative));
        let snapshot = Snapshot::build(Settings {
            enabled: true,
            mode: Mode::Whitelist,
            strict_whitelist: true,
            allow_list,
            regex_rules,
            ..Settings::default()
        });

        let verdict = should_cache(&relative, &full_url(&relative), &snapshot);
        prop_assert_eq!(verdict.cache, allowed);
    }

    // **Property 3: Registry Add Idempotence**
    // *For any* sequence of adds, the registry holds each key once, in the
    // order it was first added.
    #[test]
    fn prop_registry_add_is_idempotent(
        keys in prop::collection::vec("[a-z]{1,3}", 1..30)
    ) {
        let listed = tokio_test::block_on(async {
            let store: Arc<dyn PageStore> = Arc::new(RwLock::new(TtlStore::new(TEST_MAX_ENTRIES)));
            let registry = registry_on(store);
            for key in &keys {
                registry.add(key).await;
            }
            registry.list().await
        });

        let mut seen = HashSet::new();
        let expected: Vec<String> = keys
            .into_iter()
            .filter(|k| seen.insert(k.clone()))
            .collect();
        prop_assert_eq!(listed, expected);
    }

    // **Property 4: Single Marker**
    // *For any* document with a closing body tag, the stored page carries
    // exactly one marker, directly before the last closing body tag.
    #[test]
    fn prop_single_marker_before_closing_body(
        head in "[a-zA-Z0-9 <>/=\"]{0,200}",
        tail in "[a-zA-Z0-9 ]{0,50}",
        captured_at in 0i64..4_000_000_000
    ) {
        let body = format!("<html><body>{head}</body>{tail}</html>");
        let stored = embed_timestamp(body.as_bytes(), captured_at).unwrap();
        let stored = String::from_utf8(stored.to_vec()).unwrap();

        let marker = format!("<!--cached-at:{captured_at}-->");
        prop_assert_eq!(stored.matches("<!--cached-at:").count(), 1);
        let at = stored.rfind("</body>").unwrap();
        prop_assert!(stored[..at].ends_with(&marker));
        prop_assert_eq!(stored.replacen(&marker, "", 1), body);
    }

    // **Property 5: Session-Scoped Purge**
    // *For any* set of cached pages across sessions, purging one session
    // removes all of its pages and none of anyone else's.
    #[test]
    fn prop_session_purge_is_scoped(
        pages in prop::collection::vec((token_strategy(), relative_strategy()), 1..20),
        victim_index in any::<prop::sample::Index>()
    ) {
        let victim = victim_index.get(&pages).0.clone();
        let (remaining, victim_left) = tokio_test::block_on(async {
            let store: Arc<dyn PageStore> = Arc::new(RwLock::new(TtlStore::new(TEST_MAX_ENTRIES)));
            let registry = registry_on(store.clone());
            let purge = PurgeController::new(store.clone(), registry.clone());

            for (token, relative) in &pages {
                let key = PageKey::derive(token, relative).to_string();
                store.set(&key, Bytes::from_static(b"page"), None).await.unwrap();
                registry.add(&key).await;
            }

            purge.purge_session(&victim).await;

            let mut victim_left = false;
            for (token, relative) in pages.iter().filter(|(token, _)| *token == victim) {
                let key = PageKey::derive(token, relative).to_string();
                victim_left |= store.contains(&key).await.unwrap();
            }
            (registry.list().await, victim_left)
        });

        prop_assert!(!victim_left);
        let expected: HashSet<String> = pages
            .iter()
            .filter(|(token, _)| *token != victim)
            .map(|(token, relative)| PageKey::derive(token, relative).to_string())
            .collect();
        prop_assert_eq!(remaining.into_iter().collect::<HashSet<_>>(), expected);
    }

    // **Property 6: Capacity Enforcement**
    // *For any* sequence of writes, the store never holds more than its cap.
    #[test]
    fn prop_capacity_enforcement(
        keys in prop::collection::vec("[a-zA-Z0-9_]{1,64}", 1..200)
    ) {
        let max_entries = 50;
        let mut store = TtlStore::new(max_entries);

        for key in keys {
            let _ = store.set(&key, Bytes::from_static(b"value"), None);
            prop_assert!(
                store.len() <= max_entries,
                "Store size {} exceeds max {}",
                store.len(),
                max_entries
            );
        }
    }
}

// == Property Test for Error Response Format ==
// This tests the CacheError -> HTTP response conversion

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // **Property 7: Error Response Format**
    // *For any* error, the HTTP response carries a JSON body with an "error"
    // field holding the message.
    #[test]
    fn prop_error_response_format(
        error_msg in "[a-zA-Z0-9 _-]{1,100}"
    ) {
        use crate::error::CacheError;
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        let error_variants = vec![
            CacheError::InvalidRequest(error_msg.clone()),
            CacheError::PrefetchRejected(error_msg.clone()),
            CacheError::Store(error_msg.clone()),
            CacheError::Settings(error_msg.clone()),
        ];

        for error in error_variants {
            let response = error.into_response();

            let content_type = response.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok());
            prop_assert!(
                content_type.map(|ct| ct.contains("application/json")).unwrap_or(false),
                "Response should have JSON content-type"
            );

            let bytes = tokio_test::block_on(to_bytes(response.into_body(), usize::MAX)).unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes)
                .expect("Response body should be valid JSON");

            prop_assert_eq!(json["error"].as_str(), Some(error_msg.as_str()));
        }
    }
}
