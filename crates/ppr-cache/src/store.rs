//! Shell cache with a single-population guard.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::artifact::ShellArtifact;
use crate::headers::{CacheStatus, ShellHeaders};
use crate::key::ShellKey;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Failed to serialize/deserialize an artifact.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another attempt is already populating the key.
    #[error("shell for {key} is already being prerendered")]
    AlreadyPopulating { key: String },
}

/// A stored shell.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Lookup key.
    pub key: ShellKey,
    /// The artifact.
    pub artifact: Arc<ShellArtifact>,
    /// When the entry was stored.
    pub stored_at: DateTime<Utc>,
}

/// Shell cache backend trait.
///
/// `put` must replace an entry atomically: a concurrent `get` observes either
/// the previous entry or the new one.
#[async_trait]
pub trait ShellCacheBackend: Send + Sync {
    /// Get a stored entry.
    async fn get(&self, key: &str) -> CacheResult<Option<Arc<CacheEntry>>>;

    /// Store an entry, replacing any previous one for its key.
    async fn put(&self, entry: CacheEntry) -> CacheResult<()>;

    /// Remove one entry. Returns whether it existed.
    async fn remove(&self, key: &str) -> CacheResult<bool>;

    /// Remove every entry of a route.
    async fn remove_route(&self, route: &str) -> CacheResult<usize>;

    /// Remove everything.
    async fn clear(&self) -> CacheResult<usize>;

    /// Number of stored entries.
    async fn len(&self) -> CacheResult<usize>;
}

/// In-memory backend over a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: DashMap<String, Arc<CacheEntry>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShellCacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Arc<CacheEntry>>> {
        Ok(self.entries.get(key).map(|entry| Arc::clone(entry.value())))
    }

    async fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        self.entries
            .insert(entry.key.as_str().to_string(), Arc::new(entry));
        Ok(())
    }

    async fn remove(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn remove_route(&self, route: &str) -> CacheResult<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.key.route() != route);
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn clear(&self) -> CacheResult<usize> {
        let removed = self.entries.len();
        self.entries.clear();
        Ok(removed)
    }

    async fn len(&self) -> CacheResult<usize> {
        Ok(self.entries.len())
    }
}

/// Outcome of [`ShellCache::lookup`].
#[derive(Debug, Clone)]
pub enum CacheLookup {
    Hit(Arc<ShellArtifact>),
    Miss,
}

impl CacheLookup {
    /// Lookup outcome.
    pub fn status(&self) -> CacheStatus {
        match self {
            Self::Hit(_) => CacheStatus::Hit,
            Self::Miss => CacheStatus::Miss,
        }
    }

    /// The artifact on a hit.
    pub fn artifact(&self) -> Option<&Arc<ShellArtifact>> {
        match self {
            Self::Hit(artifact) => Some(artifact),
            Self::Miss => None,
        }
    }

    /// Response headers for this lookup: cache status, and the postponed
    /// marker when a hit has holes.
    pub fn headers(&self) -> ShellHeaders {
        match self {
            Self::Hit(artifact) => ShellHeaders::for_artifact(CacheStatus::Hit, artifact),
            Self::Miss => ShellHeaders {
                status: Some(CacheStatus::Miss),
                ..ShellHeaders::default()
            },
        }
    }
}

/// Shared shell cache.
#[derive(Clone)]
pub struct ShellCache {
    backend: Arc<dyn ShellCacheBackend>,
    populating: Arc<DashMap<String, ()>>,
}

impl ShellCache {
    /// Create a cache over a backend.
    pub fn new(backend: impl ShellCacheBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            populating: Arc::new(DashMap::new()),
        }
    }

    /// Cache backed by memory.
    pub fn in_memory() -> Self {
        Self::new(InMemoryBackend::new())
    }

    /// Store an artifact, replacing the previous entry for the key.
    pub async fn store(
        &self,
        key: ShellKey,
        artifact: ShellArtifact,
    ) -> CacheResult<Arc<ShellArtifact>> {
        let artifact = Arc::new(artifact);
        tracing::debug!(
            key = %key,
            holes = artifact.holes().len(),
            eligible = artifact.eligible(),
            "storing shell"
        );
        self.backend
            .put(CacheEntry {
                key,
                artifact: Arc::clone(&artifact),
                stored_at: Utc::now(),
            })
            .await?;
        Ok(artifact)
    }

    /// Look up the shell for a key.
    pub async fn lookup(&self, key: &ShellKey) -> CacheResult<CacheLookup> {
        let lookup = match self.backend.get(key.as_str()).await? {
            Some(entry) => CacheLookup::Hit(Arc::clone(&entry.artifact)),
            None => CacheLookup::Miss,
        };
        tracing::trace!(key = %key, status = %lookup.status(), "shell lookup");
        Ok(lookup)
    }

    /// Remove one shell.
    pub async fn purge(&self, key: &ShellKey) -> CacheResult<bool> {
        self.backend.remove(key.as_str()).await
    }

    /// Remove every variant of a route.
    pub async fn purge_route(&self, route: &str) -> CacheResult<usize> {
        self.backend.remove_route(route).await
    }

    /// Remove every shell.
    pub async fn purge_all(&self) -> CacheResult<usize> {
        let removed = self.backend.clear().await?;
        tracing::info!(removed, "shell cache purged");
        Ok(removed)
    }

    /// Number of stored shells.
    pub async fn len(&self) -> CacheResult<usize> {
        self.backend.len().await
    }

    /// Claim the right to prerender `key`. Only one attempt may populate a
    /// key at a time; the claim is released when the guard drops.
    pub fn begin_population(&self, key: &ShellKey) -> CacheResult<PopulationGuard> {
        use dashmap::mapref::entry::Entry;

        match self.populating.entry(key.as_str().to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Ok(PopulationGuard {
                    key: key.as_str().to_string(),
                    populating: Arc::clone(&self.populating),
                })
            }
            Entry::Occupied(_) => Err(CacheError::AlreadyPopulating {
                key: key.as_str().to_string(),
            }),
        }
    }
}

/// Held by the one attempt populating a key.
pub struct PopulationGuard {
    key: String,
    populating: Arc<DashMap<String, ()>>,
}

impl Drop for PopulationGuard {
    fn drop(&mut self) {
        self.populating.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use ppr_observability::DiagnosticsSink;
    use ppr_render::{RenderJob, RenderTree, View};

    use super::*;
    use crate::assemble::assemble;
    use crate::key::ShellKeyBuilder;

    async fn static_artifact(route: &str) -> ShellArtifact {
        let tree = RenderTree::from_view(View::element("p").with_child(View::text("static")));
        let job = RenderJob::new(Arc::new(tree), route);
        let outcome = job.prerender(&DiagnosticsSink::tracing()).await.unwrap();
        assemble(&outcome, job.tree()).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_miss_then_hit() {
        let cache = ShellCache::in_memory();
        let key = ShellKeyBuilder::new("b1").build("/static");

        let miss = cache.lookup(&key).await.unwrap();
        assert_eq!(miss.status(), CacheStatus::Miss);
        assert!(!miss.headers().postponed);

        cache.store(key.clone(), static_artifact("/static").await).await.unwrap();
        let hit = cache.lookup(&key).await.unwrap();

        assert_eq!(hit.status(), CacheStatus::Hit);
        assert_eq!(hit.artifact().unwrap().html(), "<p>static</p>");
        assert!(!hit.headers().postponed);
    }

    #[tokio::test]
    async fn test_store_twice_is_idempotent() {
        let cache = ShellCache::in_memory();
        let key = ShellKeyBuilder::new("b1").build("/static");
        let artifact = static_artifact("/static").await;

        cache.store(key.clone(), artifact.clone()).await.unwrap();
        let first = cache.lookup(&key).await.unwrap();
        cache.store(key.clone(), artifact).await.unwrap();
        let second = cache.lookup(&key).await.unwrap();

        assert_eq!(first.headers(), second.headers());
        assert_eq!(
            first.artifact().unwrap().html(),
            second.artifact().unwrap().html()
        );
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_route_and_all() {
        let cache = ShellCache::in_memory();
        let en = ShellKeyBuilder::new("b1").locale("en").build("/static");
        let fr = ShellKeyBuilder::new("b1").locale("fr").build("/static");
        let other = ShellKeyBuilder::new("b1").build("/other");

        cache.store(en.clone(), static_artifact("/static").await).await.unwrap();
        cache.store(fr, static_artifact("/static").await).await.unwrap();
        cache.store(other.clone(), static_artifact("/other").await).await.unwrap();

        assert_eq!(cache.purge_route("/static").await.unwrap(), 2);
        assert!(!cache.purge(&en).await.unwrap());
        assert!(cache.purge(&other).await.unwrap());
        assert_eq!(cache.purge_all().await.unwrap(), 0);
    }

    #[test]
    fn test_population_guard_is_exclusive() {
        let cache = ShellCache::in_memory();
        let key = ShellKeyBuilder::new("b1").build("/suspense/node");

        let guard = cache.begin_population(&key).unwrap();
        assert!(matches!(
            cache.begin_population(&key),
            Err(CacheError::AlreadyPopulating { .. })
        ));

        drop(guard);
        assert!(cache.begin_population(&key).is_ok());
    }
}
