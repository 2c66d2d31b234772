//! Metadata cache for resolved chronicles
//!
//! Resolving a chronicle's schema walks the whole base chain, so resolved
//! chronicles are kept in a bounded LRU cache. Many chronicles share one
//! schema, and many schemas share the same properties, so schemas and
//! properties are deduplicated: every cached chronicle points at one shared
//! schema instance per schema identity, and every cached schema points at one
//! shared property instance per property identity.
//!
//! Shared entries are reference counted. A schema entry counts the cached
//! chronicles using it; a property entry counts the cached schemas referring to
//! it. Entries disappear when their count drops to zero. Built-in properties
//! are pinned and never counted.
//!
//! Locks are always taken in the order chronicles, names, schemas, properties.

use chronos_common::config::CacheConfig;
use chronos_common::{Error, Result, Surrogate, SurrogateKey};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::builtin;
use crate::chronicle::Chronicle;
use crate::property::Property;
use crate::schema::Schema;

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of chronicle lookups answered from the cache
    pub hits: AtomicU64,
    /// Number of chronicle lookups that missed
    pub misses: AtomicU64,
    /// Number of chronicles evicted to make room
    pub evictions: AtomicU64,
    /// Number of chronicles stored
    pub stores: AtomicU64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }

    /// Reset all statistics
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.stores.store(0, Ordering::Relaxed);
    }
}

/// Reference-counted shared instance
#[derive(Debug)]
struct Shared<T> {
    refs: usize,
    value: Arc<T>,
}

impl<T> Shared<T> {
    fn new(value: Arc<T>) -> Self {
        Self { refs: 0, value }
    }
}

/// Bounded cache of resolved chronicles with shared schemas and properties
pub struct MetadataCache {
    /// Chronicle snapshots in LRU order
    chronicles: Mutex<LruCache<SurrogateKey, Arc<Chronicle>>>,
    /// Same snapshots by full name
    by_name: RwLock<HashMap<String, Arc<Chronicle>>>,
    /// Deduplicated schemas, counted by chronicles
    schemas: Mutex<HashMap<SurrogateKey, Shared<Schema>>>,
    /// Deduplicated properties, counted by schemas
    properties: Mutex<HashMap<SurrogateKey, Shared<Property>>>,
    /// Pinned built-in properties by name
    builtins: HashMap<String, Arc<Property>>,
    /// Cache statistics
    stats: CacheStats,
}

impl MetadataCache {
    /// Create a cache holding at most `capacity` chronicles
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::configuration("cache capacity must be greater than 0"))?;
        let builtins = builtin::builtins()
            .properties()
            .into_iter()
            .map(|p| (p.name().to_string(), Arc::clone(p)))
            .collect();
        Ok(Self {
            chronicles: Mutex::new(LruCache::new(capacity)),
            by_name: RwLock::new(HashMap::new()),
            schemas: Mutex::new(HashMap::new()),
            properties: Mutex::new(HashMap::new()),
            builtins,
            stats: CacheStats::default(),
        })
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::new(config.capacity)
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Maximum number of chronicles
    pub fn capacity(&self) -> usize {
        self.chronicles.lock().cap().get()
    }

    /// Current number of chronicles
    pub fn size(&self) -> usize {
        self.chronicles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Store a chronicle snapshot.
    ///
    /// Returns `Ok(None)` if an equal snapshot is already cached. Otherwise
    /// the chronicle is stored with its schema and properties replaced by the
    /// shared instances, and that stored snapshot is returned. A chronicle or
    /// schema still in construction cannot be cached.
    pub fn store(&self, chronicle: &Chronicle) -> Result<Option<Arc<Chronicle>>> {
        let key = chronicle.surrogate().key()?;
        let schema_key = chronicle.schema().surrogate().key()?;

        let mut chronicles = self.chronicles.lock();
        if let Some(cached) = chronicles.peek(&key)
            && **cached == *chronicle
        {
            chronicles.promote(&key);
            return Ok(None);
        }

        let schema = self.acquire_schema(schema_key, chronicle.schema())?;
        let snapshot = Arc::new(chronicle.with_schema(schema));
        let displaced = chronicles.push(key, Arc::clone(&snapshot));
        self.stats.stores.fetch_add(1, Ordering::Relaxed);

        let mut by_name = self.by_name.write();
        if let Some((old_key, old)) = displaced {
            if old_key != key {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(chronicle = %old.full_name(), "evicted chronicle");
            }
            Self::forget_name(&mut by_name, &old);
            self.release_schema(old.schema());
        }
        by_name.insert(snapshot.full_name().to_string(), Arc::clone(&snapshot));
        debug!(
            chronicle = %snapshot.full_name(),
            schema = %snapshot.schema().name(),
            "cached chronicle"
        );
        Ok(Some(snapshot))
    }

    /// Look up a chronicle, promoting it to most recently used
    pub fn look_up_chronicle(&self, surrogate: &Surrogate) -> Option<Arc<Chronicle>> {
        let found = surrogate
            .key()
            .ok()
            .and_then(|key| self.chronicles.lock().get(&key).cloned());
        self.record(found.is_some());
        found
    }

    /// Look up a chronicle by full name, promoting it to most recently used
    pub fn look_up_chronicle_by_name(&self, full_name: &str) -> Option<Arc<Chronicle>> {
        let found = self.by_name.read().get(full_name).cloned();
        if let Some(chronicle) = &found {
            let key = chronicle.surrogate().committed_key();
            self.chronicles.lock().promote(&key);
        }
        self.record(found.is_some());
        found
    }

    fn record(&self, hit: bool) {
        if hit {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Shared instance of a cached schema
    pub fn look_up_schema(&self, surrogate: &Surrogate) -> Option<Arc<Schema>> {
        let key = surrogate.key().ok()?;
        self.schemas
            .lock()
            .get(&key)
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Shared instance of a built-in or cached property
    pub fn look_up_property(&self, name: &str) -> Option<Arc<Property>> {
        if let Some(property) = self.builtins.get(name) {
            return Some(Arc::clone(property));
        }
        self.properties
            .lock()
            .values()
            .find(|entry| entry.value.name() == name)
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Number of cached chronicles using a schema
    pub fn schema_ref_count(&self, surrogate: &Surrogate) -> Option<usize> {
        let key = surrogate.key().ok()?;
        self.schemas.lock().get(&key).map(|entry| entry.refs)
    }

    /// Number of cached schemas referring to a property
    pub fn property_ref_count(&self, surrogate: &Surrogate) -> Option<usize> {
        let key = surrogate.key().ok()?;
        self.properties.lock().get(&key).map(|entry| entry.refs)
    }

    /// Drop one chronicle, releasing its schema.
    ///
    /// Must be called before the chronicle is renamed or deleted.
    pub fn clear_chronicle(&self, surrogate: &Surrogate) -> bool {
        let Ok(key) = surrogate.key() else {
            return false;
        };
        let mut chronicles = self.chronicles.lock();
        let Some(old) = chronicles.pop(&key) else {
            return false;
        };
        let mut by_name = self.by_name.write();
        Self::forget_name(&mut by_name, &old);
        self.release_schema(old.schema());
        info!(chronicle = %old.full_name(), "cleared chronicle from cache");
        true
    }

    /// Invalidate everything derived from a schema.
    ///
    /// Any cached chronicle may depend on the schema through its base chain,
    /// so the whole cache is cleared. Must be called before the schema is
    /// updated or deleted.
    pub fn clear_schema(&self, surrogate: &Surrogate) {
        info!(schema = %surrogate, "schema changed, clearing metadata cache");
        self.clear();
    }

    /// Invalidate everything derived from a property; clears the whole cache
    pub fn clear_property(&self, surrogate: &Surrogate) {
        info!(property = %surrogate, "property changed, clearing metadata cache");
        self.clear();
    }

    /// Drop every chronicle, schema and property
    pub fn clear(&self) {
        let mut chronicles = self.chronicles.lock();
        let mut by_name = self.by_name.write();
        let mut schemas = self.schemas.lock();
        let mut properties = self.properties.lock();
        chronicles.clear();
        by_name.clear();
        schemas.clear();
        properties.clear();
    }

    fn forget_name(by_name: &mut HashMap<String, Arc<Chronicle>>, old: &Arc<Chronicle>) {
        if by_name
            .get(old.full_name())
            .is_some_and(|current| Arc::ptr_eq(current, old))
        {
            by_name.remove(old.full_name());
        }
    }

    /// Count one more chronicle using the schema, sharing it on first use
    fn acquire_schema(&self, key: SurrogateKey, schema: &Arc<Schema>) -> Result<Arc<Schema>> {
        let mut schemas = self.schemas.lock();
        if let Some(entry) = schemas.get_mut(&key) {
            entry.refs += 1;
            return Ok(Arc::clone(&entry.value));
        }

        let shared = Arc::new(self.share_properties(schema)?);
        let mut entry = Shared::new(Arc::clone(&shared));
        entry.refs = 1;
        schemas.insert(key, entry);
        debug!(schema = %schema.name(), "cached schema");
        Ok(shared)
    }

    /// Copy of the schema using the shared property instances.
    ///
    /// Each distinct property is counted once for the schema.
    fn share_properties(&self, schema: &Schema) -> Result<Schema> {
        let mut properties = self.properties.lock();
        let mut acquired = HashSet::new();
        let shared = schema.map_properties(&mut |property: &Arc<Property>| {
            if property.surrogate().database().is_builtin()
                && let Some(builtin) = self.builtins.get(property.name())
            {
                return Ok(Arc::clone(builtin));
            }
            let key = property.surrogate().key()?;
            let entry = properties
                .entry(key)
                .or_insert_with(|| Shared::new(Arc::clone(property)));
            if acquired.insert(key) {
                entry.refs += 1;
            }
            Ok(Arc::clone(&entry.value))
        });

        if shared.is_err() {
            for key in &acquired {
                Self::release(&mut properties, key);
            }
        }
        shared
    }

    /// Count one chronicle less using the schema, dropping it at zero
    fn release_schema(&self, schema: &Schema) {
        let key = schema.surrogate().committed_key();
        let mut schemas = self.schemas.lock();
        let Some(entry) = schemas.get_mut(&key) else {
            return;
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return;
        }
        schemas.remove(&key);
        debug!(schema = %schema.name(), "dropped schema from cache");

        let mut properties = self.properties.lock();
        let distinct: HashSet<SurrogateKey> = schema
            .properties()
            .filter(|p| !p.surrogate().database().is_builtin())
            .filter_map(|p| p.surrogate().key().ok())
            .collect();
        for key in &distinct {
            Self::release(&mut properties, key);
        }
    }

    fn release(properties: &mut HashMap<SurrogateKey, Shared<Property>>, key: &SurrogateKey) {
        if let Some(entry) = properties.get_mut(key) {
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs == 0 {
                properties.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeDefinition;
    use crate::backend::{MemoryStore, MetaStore, SchemaSource};
    use crate::chronicle::SeparatorNaming;
    use crate::editable::EditableSchema;
    use crate::schema::IncompleteSchema;
    use crate::series::SeriesDefinition;
    use crate::value::{ValueKind, ValueType};
    use chronos_common::{DatabaseId, ObjectKind};
    use std::thread;

    struct Fixture {
        store: MemoryStore,
        unit: Arc<Property>,
        next_chronicle: u64,
    }

    impl Fixture {
        fn new() -> Self {
            let store = MemoryStore::new(DatabaseId::new());
            let text = store
                .insert_value_type(ValueType::new(
                    Surrogate::pending(store.database(), ObjectKind::ValueType),
                    "label",
                    ValueKind::Text,
                ))
                .unwrap();
            let unit = store
                .insert_property(Property::new(
                    Surrogate::pending(store.database(), ObjectKind::Property),
                    "unit",
                    text,
                    false,
                ))
                .unwrap();
            Self {
                store,
                unit,
                next_chronicle: 0,
            }
        }

        /// Resolved schema with a custom attribute and one series
        fn schema(&self, name: &str) -> Arc<Schema> {
            let mut schema = EditableSchema::new(
                Surrogate::pending(self.store.database(), ObjectKind::Schema),
                name,
            );
            schema
                .add_attribute(
                    AttributeDefinition::with_property(1, Arc::clone(&self.unit), Some("kg".into()))
                        .unwrap(),
                )
                .unwrap();
            schema
                .add_series(
                    SeriesDefinition::with_structure(1, "price", ValueKind::Float, "day").unwrap(),
                )
                .unwrap();
            schema
                .apply_updates(&self.store, &MetadataCache::new(1).unwrap())
                .unwrap();
            Arc::new(schema.resolve(&self.store).unwrap())
        }

        /// Fresh, separately resolved copy of a stored schema
        fn resolve_again(&self, name: &str) -> Arc<Schema> {
            let schema = self.store.editable_schema(name).unwrap().unwrap();
            Arc::new(schema.resolve(&self.store).unwrap())
        }

        fn chronicle(&mut self, name: &str, schema: Arc<Schema>) -> Chronicle {
            self.next_chronicle += 1;
            Chronicle::new(
                Surrogate::committed(
                    self.store.database(),
                    ObjectKind::Chronicle,
                    self.next_chronicle,
                ),
                name,
                None,
                None,
                schema,
                &SeparatorNaming::default(),
            )
        }
    }

    #[test]
    fn test_store_and_look_up() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(8).unwrap();
        let x = f.chronicle("x", f.schema("s"));

        let stored = cache.store(&x).unwrap().unwrap();
        assert_eq!(*stored, x);
        assert_eq!(cache.size(), 1);
        assert!(Arc::ptr_eq(
            &cache.look_up_chronicle(x.surrogate()).unwrap(),
            &stored
        ));
        assert!(Arc::ptr_eq(
            &cache.look_up_chronicle_by_name("x").unwrap(),
            &stored
        ));
        assert!(cache.look_up_chronicle_by_name("y").is_none());
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 2);
        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);

        // storing an equal snapshot again is a no-op
        assert!(cache.store(&x).unwrap().is_none());
        assert_eq!(cache.schema_ref_count(x.schema().surrogate()), Some(1));
    }

    #[test]
    fn test_schema_deduplication() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(8).unwrap();
        let schema = f.schema("s");
        let x = f.chronicle("x", Arc::clone(&schema));
        let y = f.chronicle("y", f.resolve_again("s"));
        assert!(!Arc::ptr_eq(x.schema(), y.schema()));

        let x = cache.store(&x).unwrap().unwrap();
        let y = cache.store(&y).unwrap().unwrap();
        assert!(Arc::ptr_eq(x.schema(), y.schema()));
        assert_eq!(cache.schema_ref_count(schema.surrogate()), Some(2));
        assert_eq!(cache.property_ref_count(f.unit.surrogate()), Some(1));
        assert!(Arc::ptr_eq(
            &cache.look_up_schema(schema.surrogate()).unwrap(),
            x.schema()
        ));
    }

    #[test]
    fn test_property_sharing_across_schemas() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(8).unwrap();
        let x = f.chronicle("x", f.schema("s"));
        let y = f.chronicle("y", f.schema("t"));

        let x = cache.store(&x).unwrap().unwrap();
        let y = cache.store(&y).unwrap().unwrap();
        assert!(!Arc::ptr_eq(x.schema(), y.schema()));
        assert_eq!(cache.property_ref_count(f.unit.surrogate()), Some(2));

        let unit = |c: &Chronicle| {
            Arc::clone(
                c.schema()
                    .attribute_definitions()
                    .get(1)
                    .unwrap()
                    .property()
                    .unwrap(),
            )
        };
        assert!(Arc::ptr_eq(&unit(&x), &unit(&y)));
        assert!(Arc::ptr_eq(
            &cache.look_up_property("unit").unwrap(),
            &unit(&x)
        ));
    }

    #[test]
    fn test_builtin_properties_are_pinned() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(8).unwrap();
        let x = cache
            .store(&f.chronicle("x", f.schema("s")))
            .unwrap()
            .unwrap();

        let builtins = builtin::builtins();
        let series = x.schema().series_definition(1, true).unwrap().unwrap();
        let name = series.attribute_definitions().get(1).unwrap();
        assert!(Arc::ptr_eq(
            name.property().unwrap(),
            &builtins.series_name
        ));
        assert_eq!(
            cache.property_ref_count(builtins.series_name.surrogate()),
            None
        );

        cache.clear();
        assert!(Arc::ptr_eq(
            &cache.look_up_property("series.name").unwrap(),
            &builtins.series_name
        ));
    }

    #[test]
    fn test_eviction_with_distinct_schemas() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(1).unwrap();
        let x = f.chronicle("x", f.schema("s"));
        let y = f.chronicle("y", f.schema("t"));

        cache.store(&x).unwrap();
        cache.store(&y).unwrap();
        assert_eq!(cache.size(), 1);
        assert!(cache.look_up_chronicle(x.surrogate()).is_none());
        assert!(cache.look_up_chronicle_by_name("x").is_none());
        assert!(cache.look_up_schema(x.schema().surrogate()).is_none());
        assert_eq!(cache.schema_ref_count(y.schema().surrogate()), Some(1));
        assert_eq!(cache.property_ref_count(f.unit.surrogate()), Some(1));
        assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_eviction_with_shared_schema() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(1).unwrap();
        let schema = f.schema("s");
        let x = f.chronicle("x", Arc::clone(&schema));
        let y = f.chronicle("y", Arc::clone(&schema));

        cache.store(&x).unwrap();
        cache.store(&y).unwrap();
        assert!(cache.look_up_chronicle(x.surrogate()).is_none());
        assert!(cache.look_up_chronicle(y.surrogate()).is_some());
        assert_eq!(cache.schema_ref_count(schema.surrogate()), Some(1));
    }

    #[test]
    fn test_lru_ordering() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(2).unwrap();
        let schema = f.schema("s");
        let x = f.chronicle("x", Arc::clone(&schema));
        let y = f.chronicle("y", Arc::clone(&schema));
        let z = f.chronicle("z", Arc::clone(&schema));

        cache.store(&x).unwrap();
        cache.store(&y).unwrap();
        // touch x so that y is least recently used
        cache.look_up_chronicle_by_name("x").unwrap();
        cache.store(&z).unwrap();

        assert!(cache.look_up_chronicle(x.surrogate()).is_some());
        assert!(cache.look_up_chronicle(y.surrogate()).is_none());
        assert!(cache.look_up_chronicle(z.surrogate()).is_some());
        assert_eq!(cache.schema_ref_count(schema.surrogate()), Some(2));
    }

    #[test]
    fn test_replacing_a_snapshot() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(4).unwrap();
        let x = f.chronicle("x", f.schema("s"));
        cache.store(&x).unwrap();

        let moved = Chronicle::new(
            x.surrogate().clone(),
            "x2",
            Some("renamed".into()),
            None,
            Arc::clone(x.schema()),
            &SeparatorNaming::default(),
        );
        cache.store(&moved).unwrap().unwrap();
        assert_eq!(cache.size(), 1);
        assert!(cache.look_up_chronicle_by_name("x").is_none());
        assert_eq!(
            cache.look_up_chronicle(x.surrogate()).unwrap().full_name(),
            "x2"
        );
        assert_eq!(cache.schema_ref_count(x.schema().surrogate()), Some(1));
        assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_clear_chronicle_releases_schema() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(8).unwrap();
        let schema = f.schema("s");
        let x = f.chronicle("x", Arc::clone(&schema));
        let y = f.chronicle("y", Arc::clone(&schema));
        cache.store(&x).unwrap();
        cache.store(&y).unwrap();

        assert!(cache.clear_chronicle(x.surrogate()));
        assert!(!cache.clear_chronicle(x.surrogate()));
        assert_eq!(cache.schema_ref_count(schema.surrogate()), Some(1));

        assert!(cache.clear_chronicle(y.surrogate()));
        assert_eq!(cache.schema_ref_count(schema.surrogate()), None);
        assert_eq!(cache.property_ref_count(f.unit.surrogate()), None);
        assert!(cache.look_up_property("unit").is_none());
    }

    #[test]
    fn test_clear_schema_empties_cache() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(8).unwrap();
        let x = f.chronicle("x", f.schema("s"));
        let y = f.chronicle("y", f.schema("t"));
        cache.store(&x).unwrap();
        cache.store(&y).unwrap();

        cache.clear_schema(x.schema().surrogate());
        assert!(cache.is_empty());
        assert!(cache.look_up_chronicle_by_name("y").is_none());
        assert!(cache.look_up_schema(y.schema().surrogate()).is_none());

        cache.store(&x).unwrap();
        cache.clear_property(f.unit.surrogate());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_pending_surrogates_rejected() {
        let f = Fixture::new();
        let cache = MetadataCache::new(8).unwrap();
        let pending = Chronicle::new(
            Surrogate::pending(f.store.database(), ObjectKind::Chronicle),
            "x",
            None,
            None,
            f.schema("s"),
            &SeparatorNaming::default(),
        );
        let err = cache.store(&pending).unwrap_err();
        assert_eq!(err.key(), "state.in_construction");
        assert!(cache.look_up_chronicle(pending.surrogate()).is_none());
        assert!(!cache.clear_chronicle(pending.surrogate()));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(MetadataCache::new(0).is_err());
        let cache = MetadataCache::from_config(&CacheConfig::default()).unwrap();
        assert_eq!(cache.capacity(), 10_000);
    }

    #[test]
    fn test_concurrent_store_and_look_up() {
        let mut f = Fixture::new();
        let cache = MetadataCache::new(16).unwrap();
        let schema = f.schema("s");
        let chronicles: Vec<Chronicle> = (0..64)
            .map(|i| f.chronicle(&format!("c{i}"), f.resolve_again("s")))
            .collect();

        thread::scope(|scope| {
            for part in chronicles.chunks(16) {
                let cache = &cache;
                scope.spawn(move || {
                    for chronicle in part {
                        cache.store(chronicle).unwrap();
                        cache.look_up_chronicle_by_name(chronicle.full_name());
                        cache.look_up_chronicle(chronicle.surrogate());
                    }
                });
            }
        });

        assert_eq!(cache.size(), 16);
        assert_eq!(cache.schema_ref_count(schema.surrogate()), Some(16));
        assert_eq!(cache.property_ref_count(f.unit.surrogate()), Some(1));
        assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 48);
    }
}
