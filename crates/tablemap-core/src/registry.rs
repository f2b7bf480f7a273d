//! Per-type cache of resolved metadata.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Result;
use crate::introspected::Introspected;
use crate::mapping::Entity;

/// Resolve-once cache of [`Introspected`] descriptors keyed by type.
///
/// Concurrent first lookups of the same type may both resolve; the first
/// one stored wins and the other result is dropped.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The descriptor of `T`, resolving it on first use.
    pub fn get<T: Entity>(&self) -> Result<Arc<Introspected<T>>> {
        let key = TypeId::of::<T>();
        if let Some(found) = self.entries.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            if let Ok(meta) = Arc::clone(found).downcast::<Introspected<T>>() {
                return Ok(meta);
            }
        }

        let resolved: Arc<dyn Any + Send + Sync> = Arc::new(Introspected::<T>::resolve()?);
        let stored = Arc::clone(
            self.entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key)
                .or_insert(resolved),
        );
        Ok(stored
            .downcast::<Introspected<T>>()
            .unwrap_or_else(|_| unreachable!("registry entry keyed by TypeId of its own type")))
    }

    pub fn contains<T: Entity>(&self) -> bool {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every resolved descriptor.
    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
