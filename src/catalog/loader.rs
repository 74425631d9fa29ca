//! Deduplicating fetch layer for templates and regional cost tables.
//!
//! Concurrent requests for the same key share one in-flight load; a completed
//! load is served from memory until invalidated. A failed load leaves the slot
//! empty, so the next caller fetches again.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{Catalog, IndustryTemplate};
use crate::config::{EngineConfig, RegionConfig};
use crate::error::{EngineError, EngineResult};

/// External store of templates and cost tables.
pub trait TemplateSource: Send + Sync {
    fn load_template(
        &self,
        industry: &str,
        subtype: Option<&str>,
    ) -> impl Future<Output = EngineResult<IndustryTemplate>> + Send;

    fn load_cost_tables(&self, region: &str)
    -> impl Future<Output = EngineResult<RegionConfig>> + Send;
}

/// Map of per-key once-cells.
pub struct InflightCache<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<Arc<V>>>>>,
}

impl<K, V> Default for InflightCache<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> InflightCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, running `load` at most once across
    /// all concurrent callers.
    ///
    /// # Errors
    ///
    /// Propagates the loader's error. The key's slot is dropped and a later
    /// call retries.
    pub async fn get_or_try_load<F, Fut>(&self, key: K, load: F) -> EngineResult<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<V>>,
    {
        let cell = {
            let mut cells = self.cells.lock();
            Arc::clone(cells.entry(key.clone()).or_default())
        };
        let loaded = cell
            .get_or_try_init(|| async { load().await.map(Arc::new) })
            .await
            .map(Arc::clone);
        if loaded.is_err() {
            self.release_empty(&key, &cell);
        }
        loaded
    }

    /// Removes `cell` if it is still the slot for `key` and never filled.
    fn release_empty(&self, key: &K, cell: &Arc<OnceCell<Arc<V>>>) {
        let mut cells = self.cells.lock();
        let stale = cells
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            cells.remove(key);
        }
    }

    /// Drops the entry for `key`. Returns whether a value was cached.
    pub fn invalidate(&self, key: &K) -> bool {
        self.cells
            .lock()
            .remove(key)
            .is_some_and(|cell| cell.initialized())
    }

    pub fn clear(&self) {
        self.cells.lock().clear();
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .values()
            .filter(|c| c.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type TemplateKey = (String, Option<String>);

/// [`TemplateSource`] wrapper that deduplicates and caches loads.
pub struct DedupLoader<S> {
    source: S,
    templates: InflightCache<TemplateKey, IndustryTemplate>,
    regions: InflightCache<String, RegionConfig>,
}

impl<S: TemplateSource> DedupLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            templates: InflightCache::new(),
            regions: InflightCache::new(),
        }
    }

    /// # Errors
    ///
    /// Propagates the source's lookup error.
    pub async fn template(
        &self,
        industry: &str,
        subtype: Option<&str>,
    ) -> EngineResult<Arc<IndustryTemplate>> {
        let key = (industry.to_string(), subtype.map(str::to_string));
        self.templates
            .get_or_try_load(key, || {
                debug!(industry, ?subtype, "fetching template");
                self.source.load_template(industry, subtype)
            })
            .await
    }

    /// # Errors
    ///
    /// Propagates the source's lookup error.
    pub async fn cost_tables(&self, region: &str) -> EngineResult<Arc<RegionConfig>> {
        self.regions
            .get_or_try_load(region.to_string(), || {
                debug!(region, "fetching cost tables");
                self.source.load_cost_tables(region)
            })
            .await
    }

    pub fn invalidate_template(&self, industry: &str, subtype: Option<&str>) -> bool {
        self.templates
            .invalidate(&(industry.to_string(), subtype.map(str::to_string)))
    }

    pub fn invalidate_cost_tables(&self, region: &str) -> bool {
        self.regions.invalidate(&region.to_string())
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// In-memory source over a catalog and an engine configuration.
#[derive(Debug, Clone)]
pub struct StaticSource {
    catalog: Catalog,
    config: EngineConfig,
}

impl StaticSource {
    pub fn new(catalog: Catalog, config: EngineConfig) -> Self {
        Self { catalog, config }
    }
}

impl TemplateSource for StaticSource {
    async fn load_template(
        &self,
        industry: &str,
        subtype: Option<&str>,
    ) -> EngineResult<IndustryTemplate> {
        self.catalog
            .lookup(industry, subtype)
            .map(|t| (*t).clone())
    }

    async fn load_cost_tables(&self, region: &str) -> EngineResult<RegionConfig> {
        self.config
            .region(region)
            .cloned()
            .ok_or_else(|| EngineError::invalid("region", format!("unknown region \"{region}\"")))
    }
}
