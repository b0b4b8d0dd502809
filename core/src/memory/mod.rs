use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Key under which a finished run stores its final answer.
pub const LAST_ANSWER_KEY: &str = "last_answer";

#[derive(Debug, Default)]
struct Entries {
    order: Vec<String>,
    values: HashMap<String, Value>,
}

impl Entries {
    fn upsert(&mut self, key: &str, value: Value) {
        if self.values.insert(key.to_string(), value).is_none() {
            self.order.push(key.to_string());
        }
    }
}

/// Process-scoped key/value store, shared between runs through an `Arc`.
///
/// Each call is atomic on its own. Nothing coordinates sequences of calls,
/// so concurrent writers to one key are last-write-wins. Callers that need
/// isolation use separate instances.
#[derive(Debug, Default)]
pub struct Memory {
    entries: Mutex<Entries>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().values.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.lock().upsert(key, value.into());
    }

    /// Appends to the list stored under `key`. An absent key starts an empty
    /// list; a scalar already stored becomes the first element.
    pub fn append(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut entries = self.lock();
        match entries.values.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => entries.upsert(key, Value::Array(vec![value])),
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut entries = self.lock();
        let removed = entries.values.remove(key);
        if removed.is_some() {
            entries.order.retain(|k| k != key);
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().values.contains_key(key)
    }

    /// Keys in first-insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().order.is_empty()
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.order.clear();
        entries.values.clear();
    }
}
