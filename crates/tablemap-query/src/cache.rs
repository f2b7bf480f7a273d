//! Statement caching for synthesized SQL.
//!
//! Caches SQL text keyed by the mapped type it was synthesized for, so
//! repeated writes of the same type skip string building.

use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Bounded, insertion-ordered cache of SQL text per mapped type.
///
/// Reads do not refresh an entry. Once an insert pushes the cache past
/// `max_size`, the oldest entries are evicted first.
///
/// # Example
///
/// ```
/// use std::any::TypeId;
/// use tablemap_query::cache::StatementCache;
///
/// let mut cache = StatementCache::new(100);
/// let key = TypeId::of::<u8>();
///
/// let sql = cache.get_or_insert(key, || "DELETE FROM t WHERE id=?".to_string());
/// assert_eq!(&*sql, "DELETE FROM t WHERE id=?");
///
/// // Second call returns cached version
/// let called = std::cell::Cell::new(false);
/// cache.get_or_insert(key, || {
///     called.set(true);
///     String::new()
/// });
/// assert!(!called.get());
/// ```
#[derive(Debug)]
pub struct StatementCache {
    cache: HashMap<TypeId, Arc<str>>,
    order: VecDeque<TypeId>,
    max_size: usize,
}

impl StatementCache {
    /// Create a new cache with the given maximum number of entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            cache: HashMap::with_capacity(max_size.min(256)),
            order: VecDeque::with_capacity(max_size.min(256)),
            max_size,
        }
    }

    /// Get a cached statement or build and insert it.
    ///
    /// The `builder` closure is only called on cache miss.
    pub fn get_or_insert(&mut self, key: TypeId, builder: impl FnOnce() -> String) -> Arc<str> {
        if let Some(sql) = self.cache.get(&key) {
            return Arc::clone(sql);
        }
        let sql: Arc<str> = Arc::from(builder());
        self.insert(key, Arc::clone(&sql));
        sql
    }

    pub fn get(&self, key: TypeId) -> Option<Arc<str>> {
        self.cache.get(&key).cloned()
    }

    /// Store `sql` for `key`, evicting the oldest entries past capacity.
    /// Replacing an existing entry keeps its original position.
    pub fn insert(&mut self, key: TypeId, sql: Arc<str>) {
        if self.cache.insert(key, sql).is_none() {
            self.order.push_back(key);
        }
        while self.cache.len() > self.max_size {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.cache.remove(&oldest);
                    tracing::trace!(?oldest, capacity = self.max_size, "Evicted cached statement");
                }
                None => break,
            }
        }
    }

    /// Check if a statement is cached.
    pub fn contains(&self, key: TypeId) -> bool {
        self.cache.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Clear all cached statements.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.order.clear();
    }
}

impl Default for StatementCache {
    fn default() -> Self {
        Self::new(500)
    }
}

/// The INSERT and UPDATE caches shared by one writer.
///
/// Each sits behind its own lock; a miss builds the text while holding it,
/// so concurrent misses for one type produce it once.
#[derive(Debug)]
pub struct StatementCaches {
    insert: Mutex<StatementCache>,
    update: Mutex<StatementCache>,
}

impl StatementCaches {
    pub fn new(max_size: usize) -> Self {
        Self {
            insert: Mutex::new(StatementCache::new(max_size)),
            update: Mutex::new(StatementCache::new(max_size)),
        }
    }

    pub fn insert_sql(&self, key: TypeId, builder: impl FnOnce() -> String) -> Arc<str> {
        locked(&self.insert).get_or_insert(key, builder)
    }

    pub fn update_sql(&self, key: TypeId, builder: impl FnOnce() -> String) -> Arc<str> {
        locked(&self.update).get_or_insert(key, builder)
    }

    pub fn insert_len(&self) -> usize {
        locked(&self.insert).len()
    }

    pub fn update_len(&self) -> usize {
        locked(&self.update).len()
    }

    pub fn contains_insert(&self, key: TypeId) -> bool {
        locked(&self.insert).contains(key)
    }

    pub fn contains_update(&self, key: TypeId) -> bool {
        locked(&self.update).contains(key)
    }

    pub fn clear(&self) {
        locked(&self.insert).clear();
        locked(&self.update).clear();
    }
}

// A builder that panicked left the cache unchanged, so a poisoned lock is still usable.
fn locked(cache: &Mutex<StatementCache>) -> MutexGuard<'_, StatementCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for StatementCaches {
    fn default() -> Self {
        Self::new(500)
    }
}
