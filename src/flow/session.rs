use crate::flow::state::{InMemoryState, SessionState};
use async_trait::async_trait;
use moka::future::Cache;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub type SessionStore = Arc<dyn SessionStoreType>;

/// Factory and cache for per-session context stores.
#[async_trait]
pub trait SessionStoreType: Send + Sync + Debug {
    /// Returns an existing session if it exists.
    async fn get(&self, session_id: &str) -> Option<SessionState>;
    /// Returns an existing session or creates a new empty one.
    async fn get_or_create(&self, session_id: &str) -> SessionState;

    async fn remove(&self, session_id: &str);

    fn clear(&self);
}

#[derive(Clone, Debug)]
pub struct InMemorySessionStore {
    cache: Cache<String, Arc<InMemoryState>>,
}

impl InMemorySessionStore {
    /// Creates a new store whose sessions expire after `ttl_secs` of inactivity.
    pub fn new(ttl_secs: u64) -> Arc<Self> {
        let cache = Cache::builder()
            .time_to_idle(Duration::from_secs(ttl_secs))
            .eviction_listener(|key: Arc<String>, _value: Arc<InMemoryState>, cause| {
                info!("Session expired: key={}, cause={:?}", key, cause);
            })
            .build();

        Arc::new(Self { cache })
    }
}

#[async_trait]
impl SessionStoreType for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Option<SessionState> {
        self.cache
            .get(session_id)
            .await
            .map(|state| state as SessionState)
    }

    async fn get_or_create(&self, session_id: &str) -> SessionState {
        let state = self
            .cache
            .get_with(session_id.to_string(), async { InMemoryState::new() })
            .await;
        state as SessionState
    }

    async fn remove(&self, session_id: &str) {
        self.cache.invalidate(session_id).await;
    }

    fn clear(&self) {
        self.cache.invalidate_all();
    }
}
