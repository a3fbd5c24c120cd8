//! Purge Controller
//!
//! Invalidates cached pages site-wide or for one session, using the registry
//! to find them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::key::PageKey;
use crate::cache::registry::Registry;
use crate::cache::PageStore;
use crate::settings::Settings;

/// What a purge removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurgeScope {
    Site,
    Session,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub scope: PurgeScope,
    /// Registered keys dropped
    pub removed: usize,
}

pub struct PurgeController {
    store: Arc<dyn PageStore>,
    registry: Arc<Registry>,
}

impl PurgeController {
    pub fn new(store: Arc<dyn PageStore>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    /// Deletes every registered page and empties the registry.
    pub async fn purge_all(&self) -> PurgeReport {
        let keys = self.registry.clear().await;
        self.delete_entries(&keys).await;
        info!(removed = keys.len(), "Purged all cached pages");
        PurgeReport {
            scope: PurgeScope::Site,
            removed: keys.len(),
        }
    }

    /// Deletes the pages of session `token`; other sessions keep theirs.
    pub async fn purge_session(&self, token: &str) -> PurgeReport {
        let keys = self
            .registry
            .remove_all(|key| PageKey::belongs_to(key, token))
            .await;
        self.delete_entries(&keys).await;
        info!(removed = keys.len(), "Purged session cached pages");
        PurgeReport {
            scope: PurgeScope::Session,
            removed: keys.len(),
        }
    }

    /// Runs the purge bound to `event` in `settings`, if any. Session purges
    /// need the acting session's token.
    pub async fn on_event(
        &self,
        event: &str,
        session: Option<&str>,
        settings: &Settings,
    ) -> Option<PurgeReport> {
        if settings.full_purge_events.iter().any(|e| e == event) {
            return Some(self.purge_all().await);
        }
        if settings.user_purge_events.iter().any(|e| e == event) {
            return match session {
                Some(token) => Some(self.purge_session(token).await),
                None => {
                    warn!(event, "Session purge event without a session");
                    None
                }
            };
        }
        None
    }

    async fn delete_entries(&self, keys: &[String]) {
        for key in keys {
            if let Err(err) = self.store.delete(key).await {
                warn!(key = %key, error = %err, "Failed to delete cached page");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::lock::{LocalLock, RetryPolicy};
    use crate::cache::TtlStore;
    use bytes::Bytes;
    use tokio::sync::RwLock;

    struct Fixture {
        store: Arc<dyn PageStore>,
        registry: Arc<Registry>,
        purge: PurgeController,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn PageStore> = Arc::new(RwLock::new(TtlStore::new(100)));
        let registry = Arc::new(Registry::new(
            store.clone(),
            Arc::new(LocalLock::new()),
            RetryPolicy::default(),
        ));
        let purge = PurgeController::new(store.clone(), registry.clone());
        Fixture {
            store,
            registry,
            purge,
        }
    }

    async fn cache_page(f: &Fixture, token: &str, relative: &str) -> String {
        let key = PageKey::derive(token, relative).to_string();
        f.store
            .set(&key, Bytes::from_static(b"<html></html>"), None)
            .await
            .unwrap();
        f.registry.add(&key).await;
        key
    }

    #[tokio::test]
    async fn purge_all_empties_registry_and_store() {
        let f = fixture();
        let a = cache_page(&f, "alice", "index.php").await;
        let b = cache_page(&f, "bob", "index.php").await;

        let report = f.purge.purge_all().await;

        assert_eq!(report.removed, 2);
        assert!(f.registry.list().await.is_empty());
        assert!(!f.store.contains(&a).await.unwrap());
        assert!(!f.store.contains(&b).await.unwrap());
    }

    #[tokio::test]
    async fn purge_session_keeps_other_sessions() {
        let f = fixture();
        let a1 = cache_page(&f, "alice", "index.php").await;
        let a2 = cache_page(&f, "alice", "tools.php").await;
        let ab = cache_page(&f, "alice_b", "index.php").await;
        let b = cache_page(&f, "bob", "index.php").await;

        let report = f.purge.purge_session("alice").await;

        assert_eq!(report.removed, 2);
        assert_eq!(f.registry.list().await, vec![ab.clone(), b.clone()]);
        assert!(!f.store.contains(&a1).await.unwrap());
        assert!(!f.store.contains(&a2).await.unwrap());
        assert!(f.store.contains(&ab).await.unwrap());
        assert!(f.store.contains(&b).await.unwrap());
    }

    #[tokio::test]
    async fn events_dispatch_to_bound_purges() {
        let f = fixture();
        let settings = Settings {
            full_purge_events: vec!["plugin_activated".to_string()],
            user_purge_events: vec!["post_saved".to_string()],
            ..Settings::default()
        };
        cache_page(&f, "alice", "index.php").await;
        cache_page(&f, "bob", "index.php").await;

        assert_eq!(f.purge.on_event("unbound", Some("alice"), &settings).await, None);
        assert_eq!(f.purge.on_event("post_saved", None, &settings).await, None);

        let report = f
            .purge
            .on_event("post_saved", Some("alice"), &settings)
            .await
            .unwrap();
        assert_eq!(report.scope, PurgeScope::Session);
        assert_eq!(report.removed, 1);

        let report = f
            .purge
            .on_event("plugin_activated", None, &settings)
            .await
            .unwrap();
        assert_eq!(report.scope, PurgeScope::Site);
        assert_eq!(report.removed, 1);
    }
}
