//! The leader's shared resources: worker pool, HTTP client and caches.
//!
//! Only a leader (published or isolated) builds one. Followers reach it
//! through the bridge and never construct their own.

use crate::api::SkinData;
use crate::error::{BridgeError, BridgeResult};
use crate::settings::Settings;
use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::debug;
use uuid::Uuid;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// A map whose entries expire after a fixed lifetime.
pub struct TtlMap<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlMap<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Insert `value`, dropping expired entries first.
    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Profile lookups shared by every profile service of one leader.
///
/// Names are keyed case-insensitively. Misses are not cached.
pub struct ProfileCache {
    names: TtlMap<Uuid, String>,
    ids: TtlMap<String, Uuid>,
    skins: TtlMap<Uuid, SkinData>,
}

impl ProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            names: TtlMap::new(ttl),
            ids: TtlMap::new(ttl),
            skins: TtlMap::new(ttl),
        }
    }

    pub fn name(&self, id: &Uuid) -> Option<String> {
        self.names.get(id)
    }

    pub fn id(&self, name: &str) -> Option<Uuid> {
        self.ids.get(&name.to_lowercase())
    }

    pub fn skin(&self, id: &Uuid) -> Option<SkinData> {
        self.skins.get(id)
    }

    /// Record a name/id pair in both directions.
    pub fn put_profile(&self, id: Uuid, name: &str) {
        self.names.insert(id, name.to_string());
        self.ids.insert(name.to_lowercase(), id);
    }

    pub fn put_skin(&self, id: Uuid, skin: SkinData) {
        self.skins.insert(id, skin);
    }

    pub fn clear(&self) {
        self.names.clear();
        self.ids.clear();
        self.skins.clear();
    }

    pub fn len(&self) -> usize {
        self.names.len() + self.ids.len() + self.skins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Worker pool, HTTP client and profile cache of one leader.
pub struct SharedRuntime {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    http: reqwest::Client,
    profiles: Arc<ProfileCache>,
}

impl SharedRuntime {
    pub fn new(settings: &Settings) -> BridgeResult<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name("quorum-worker");
        if let Some(threads) = settings.worker_threads {
            builder.worker_threads(threads);
        }
        let runtime = builder
            .build()
            .map_err(|e| BridgeError::Runtime(format!("failed to build worker pool: {e}")))?;

        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .user_agent(settings.http.user_agent.clone())
            .build()?;

        debug!(
            worker_threads = ?settings.worker_threads,
            cache_ttl_secs = settings.cache_ttl_secs,
            "Shared runtime started"
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            http,
            profiles: Arc::new(ProfileCache::new(settings.cache_ttl())),
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn profiles(&self) -> &Arc<ProfileCache> {
        &self.profiles
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime.lock().is_none()
    }

    /// Run `task` on the worker pool. The returned future can be awaited
    /// from any executor.
    pub fn spawn<T, F>(&self, task: F) -> BoxFuture<'static, BridgeResult<T>>
    where
        T: Send + 'static,
        F: Future<Output = BridgeResult<T>> + Send + 'static,
    {
        if self.is_shut_down() {
            return future::ready(Err(BridgeError::Closed("shared runtime".to_string()))).boxed();
        }
        let join = self.handle.spawn(task);
        async move {
            join.await
                .map_err(|e| BridgeError::Runtime(format!("worker task failed: {e}")))?
        }
        .boxed()
    }

    /// Stop the worker pool without waiting for running tasks.
    pub fn shutdown(&self) {
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
            debug!("Shared runtime stopped");
        }
    }
}

impl Drop for SharedRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_map_expiry() {
        let map: TtlMap<&str, u32> = TtlMap::new(Duration::ZERO);
        map.insert("a", 1);
        assert_eq!(map.get(&"a"), None);
        assert_eq!(map.purge_expired(), 1);
        assert!(map.is_empty());

        let map: TtlMap<&str, u32> = TtlMap::new(Duration::from_secs(60));
        map.insert("a", 1);
        assert_eq!(map.get(&"a"), Some(1));
        assert_eq!(map.purge_expired(), 0);
    }

    #[test]
    fn test_insert_drops_expired_entries() {
        let map: TtlMap<&str, u32> = TtlMap::new(Duration::ZERO);
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("c", 3);
        assert_eq!(map.len(), 1);

        let cache = ProfileCache::new(Duration::ZERO);
        for _ in 0..3 {
            cache.put_profile(Uuid::new_v4(), "Notch");
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_profile_cache_is_case_insensitive_by_name() {
        let cache = ProfileCache::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        cache.put_profile(id, "Notch");

        assert_eq!(cache.id("notch"), Some(id));
        assert_eq!(cache.name(&id).as_deref(), Some("Notch"));
        assert_eq!(cache.skin(&id), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_spawn_and_shutdown() {
        let runtime = SharedRuntime::new(&Settings::default()).unwrap();
        let value = futures::executor::block_on(runtime.spawn(async { Ok(21 * 2) })).unwrap();
        assert_eq!(value, 42);

        runtime.shutdown();
        assert!(runtime.is_shut_down());
        let err = futures::executor::block_on(runtime.spawn(async { Ok(()) })).unwrap_err();
        assert!(matches!(err, BridgeError::Closed(_)));
    }

    #[tokio::test]
    async fn test_drop_inside_async_context() {
        let runtime = SharedRuntime::new(&Settings::default().with_protocol_version(3)).unwrap();
        assert_eq!(runtime.spawn(async { Ok("done") }).await.unwrap(), "done");
        drop(runtime);
    }
}
