//! Process-wide key/value store shared by steps and tasks.
//!
//! Step options are published here before a step's tasks are built, and
//! tasks accumulate cross-step results (e.g. status rows) for later display.
//! [`SharedContext::begin`] returns a scoped write guard so a caller can
//! read and write several keys atomically.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Store = HashMap<String, Value>;

/// Lock-guarded map of JSON values
#[derive(Debug, Default)]
pub struct SharedContext {
    inner: RwLock<Store>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The context shared by the whole process
    pub fn global() -> &'static SharedContext {
        static GLOBAL: OnceLock<SharedContext> = OnceLock::new();
        GLOBAL.get_or_init(SharedContext::new)
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    /// Deserialize a stored value; `None` if absent or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        serde_json::from_value(value).ok()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.read()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.write().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write().remove(key)
    }

    /// Set `key[sub_key] = value`, turning `key` into an object if needed
    pub fn merge_into(&self, key: &str, sub_key: &str, value: impl Into<Value>) {
        merge_into(&mut self.write(), key, sub_key, value.into());
    }

    /// Push `value` onto the array at `key`, creating it if needed
    pub fn append(&self, key: &str, value: impl Into<Value>) {
        append(&mut self.write(), key, value.into());
    }

    /// Hold the write lock across a batch of reads and writes.
    ///
    /// Every other reader and writer (including concurrent task
    /// constructors) waits until the guard is dropped. Use the guard, not
    /// the context, while it is alive: the lock is not reentrant.
    pub fn begin(&self) -> ContextTransaction<'_> {
        ContextTransaction {
            store: self.write(),
        }
    }
}

/// Exclusive access to a [`SharedContext`] until dropped
pub struct ContextTransaction<'a> {
    store: RwLockWriteGuard<'a, Store>,
}

impl ContextTransaction<'_> {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.store.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.store.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.store.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.store.remove(key)
    }

    pub fn merge_into(&mut self, key: &str, sub_key: &str, value: impl Into<Value>) {
        merge_into(&mut self.store, key, sub_key, value.into());
    }

    pub fn append(&mut self, key: &str, value: impl Into<Value>) {
        append(&mut self.store, key, value.into());
    }

    /// Release the lock
    pub fn commit(self) {}
}

fn merge_into(store: &mut Store, key: &str, sub_key: &str, value: Value) {
    let slot = store
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        map.insert(sub_key.to_string(), value);
    }
}

fn append(store: &mut Store, key: &str, value: Value) {
    let slot = store
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    if let Value::Array(items) = slot {
        items.push(value);
    }
}
