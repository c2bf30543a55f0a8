//! In-memory cache backend
//!
//! The default backend for tests and single-node deployments. All slots
//! live in a two-level map behind one lock; critical sections only copy
//! values in or out, so the lock is never held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::{Cache, CacheError, SubKey, Value};

/// In-memory implementation of [`Cache`].
#[derive(Clone, Default)]
pub struct LocalCache {
    entries: Arc<RwLock<HashMap<Uuid, HashMap<SubKey, Value>>>>,
}

impl LocalCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for LocalCache {
    async fn get_value(&self, key: Uuid, sub_key: SubKey) -> Result<Value, CacheError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        let slots = entries.get(&key).ok_or(CacheError::KeyNotFound(key))?;
        slots
            .get(&sub_key)
            .cloned()
            .ok_or(CacheError::SubKeyNotFound { key, sub_key })
    }

    async fn set_value(&self, key: Uuid, sub_key: SubKey, value: Value) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        entries.entry(key).or_default().insert(sub_key, value);
        Ok(())
    }
}
