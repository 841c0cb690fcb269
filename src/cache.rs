use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Method;

use crate::envelope::ApiEnvelope;
use crate::gateway::{ApiRequest, Gateway};
use crate::proxy::request::{has_body, QueryParams};
use crate::resources::{Action, Resource};

/// Entry stored in the local DashMap with an expiry timestamp.
#[derive(Clone)]
pub(crate) struct CacheEntry {
    value: ApiEnvelope,
    pub(crate) expires_at: Instant,
}

/// In-memory cache of successful read envelopes, keyed by
/// `resource:action?params`.
///
/// Entries honour their TTL lazily on read, and `insert()` sweeps expired
/// entries at most once per TTL. Writers must call `invalidate_resource()`
/// after create/update/delete.
///
/// Every resource carries a generation that `invalidate_resource()` bumps.
/// A read that started before a write cannot repopulate the cache after it.
#[derive(Clone)]
pub struct ResourceCache {
    pub(crate) local: Arc<DashMap<String, CacheEntry>>,
    generations: Arc<DashMap<String, u64>>,
    next_sweep: Arc<Mutex<Instant>>,
    ttl: Duration,
}

impl ResourceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            local: Arc::new(DashMap::new()),
            generations: Arc::new(DashMap::new()),
            next_sweep: Arc::new(Mutex::new(Instant::now() + ttl)),
            ttl,
        }
    }

    /// Current generation of `resource`. Read it before fetching.
    pub fn generation(&self, resource: &str) -> u64 {
        *self.generations.entry(resource.to_string()).or_insert(0)
    }

    pub fn key(resource: &str, action: &str, params: &QueryParams) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        format!("{}:{}?{}", resource, action, query)
    }

    pub fn get(&self, key: &str) -> Option<ApiEnvelope> {
        if let Some(entry) = self.local.get(key) {
            if Instant::now() < entry.expires_at {
                return Some(entry.value.clone());
            }
            // expired: drop the ref before removing
            drop(entry);
            self.local.remove(key);
        }
        None
    }

    pub fn insert(&self, key: String, value: ApiEnvelope) {
        self.sweep_if_due();
        self.local.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Insert only if `resource` has not been invalidated since `generation`
    /// was read. Returns whether the entry was stored.
    pub fn insert_if_current(&self, resource: &str, generation: u64, key: String, value: ApiEnvelope) -> bool {
        // the read guard blocks a concurrent bump until the insert is done
        let current = self.generations.get(resource);
        if current.as_deref().copied().unwrap_or(0) != generation {
            return false;
        }
        self.insert(key, value);
        true
    }

    /// Drop every cached read of `resource`. Returns how many entries went.
    pub fn invalidate_resource(&self, resource: &str) -> usize {
        *self.generations.entry(resource.to_string()).or_insert(0) += 1;
        let prefix = format!("{}:", resource);
        let before = self.local.len();
        self.local.retain(|key, _| !key.starts_with(&prefix));
        before - self.local.len()
    }

    /// Remove all expired entries.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.local.len();
        self.local.retain(|_, entry| entry.expires_at > now);
        before - self.local.len()
    }

    fn sweep_if_due(&self) {
        let now = Instant::now();
        let Ok(mut next) = self.next_sweep.lock() else {
            return;
        };
        if now < *next {
            return;
        }
        *next = now + self.ttl;
        drop(next);

        let evicted = self.evict_expired();
        if evicted > 0 {
            tracing::debug!(evicted, "swept expired cache entries");
        }
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}

/// Serves repeated reads from a [`ResourceCache`] and invalidates it on
/// every write that passes through.
pub struct CachingGateway<G> {
    inner: G,
    cache: ResourceCache,
}

impl<G: Gateway> CachingGateway<G> {
    pub fn new(inner: G, cache: ResourceCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }
}

#[async_trait]
impl<G: Gateway> Gateway for CachingGateway<G> {
    async fn call(&self, request: ApiRequest) -> ApiEnvelope {
        let resource = Resource::from(request.resource.as_str());
        let action = Action::from(request.action.as_str());

        let cacheable = !action.is_write()
            && !has_body(request.body.as_ref())
            && request.method.as_ref().map_or(true, |m| *m == Method::GET);

        let key = cacheable.then(|| ResourceCache::key(resource.as_str(), action.as_str(), &request.params));
        if let Some(hit) = key.as_deref().and_then(|k| self.cache.get(k)) {
            tracing::debug!(%resource, %action, "served from cache");
            return hit;
        }
        let generation = self.cache.generation(resource.as_str());

        let envelope = self.inner.call(request).await;

        if action.is_write() {
            // the backend may have applied a failed write partially
            let dropped = self.cache.invalidate_resource(resource.as_str())
                + self.cache.invalidate_resource(Resource::Dashboard.as_str());
            tracing::debug!(%resource, %action, dropped, "cache invalidated after write");
        } else if let Some(key) = key {
            if envelope.is_ok()
                && !self
                    .cache
                    .insert_if_current(resource.as_str(), generation, key, envelope.clone())
            {
                tracing::debug!(%resource, %action, "resource written during read, not cached");
            }
        }

        envelope
    }
}
