//! Readers-writer gate over the tree engine.
//!
//! The engine is the only shared mutable state in a keywire server and no
//! component touches it directly: every access goes through [`Store`],
//! which admits any number of concurrent readers or exactly one writer.

use keywire_proto::Value;
use tokio::sync::RwLock;

use crate::{errors::TreeError, tree::AbTree};

/// Concurrent store: the (a,b)-tree behind a shared-exclusive gate.
///
/// `add` and `remove` run inside a write critical section, `find` inside a
/// read critical section, so a reader never observes a half-completed
/// mutation and writers are serialised. Each operation takes effect at the
/// single point where it acquires its guard; the effective write order is
/// the guard acquisition order.
///
/// The gate queues acquisitions fairly, so a continuous stream of readers
/// cannot starve a writer.
#[derive(Debug)]
pub struct Store {
    tree: RwLock<AbTree>,
}

impl Store {
    /// Create a store over an empty tree with fan-out bounds `(min, max)`.
    ///
    /// # Errors
    ///
    /// [`TreeError::InvalidParameters`] for bounds an (a,b)-tree cannot
    /// keep balanced.
    pub fn new(min: usize, max: usize) -> Result<Self, TreeError> {
        Ok(Self { tree: RwLock::new(AbTree::new(min, max)?) })
    }

    /// Insert a key or replace its value, returning the previous value.
    pub async fn add(&self, key: String, value: Value) -> Option<Value> {
        self.tree.write().await.insert(key, value)
    }

    /// Remove a key, returning its value. Absent keys succeed as no-ops.
    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.tree.write().await.remove(key)
    }

    /// Look up a key, cloning the value out of the read critical section.
    pub async fn find(&self, key: &str) -> Option<Value> {
        self.tree.read().await.find(key).cloned()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.tree.read().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.tree.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_find_remove() {
        let store = Store::new(2, 3).expect("valid parameters");

        assert_eq!(store.add("k".into(), Value::Text("v".into())).await, None);
        assert_eq!(store.find("k").await, Some(Value::Text("v".into())));

        assert_eq!(store.remove("k").await, Some(Value::Text("v".into())));
        assert_eq!(store.find("k").await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn add_replaces_existing_value() {
        let store = Store::new(2, 3).expect("valid parameters");

        store.add("k".into(), Value::Int(1)).await;
        assert_eq!(store.add("k".into(), Value::Int(2)).await, Some(Value::Int(1)));
        assert_eq!(store.find("k").await, Some(Value::Int(2)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn remove_absent_key_succeeds() {
        let store = Store::new(2, 3).expect("valid parameters");
        assert_eq!(store.remove("missing").await, None);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(Store::new(1, 1).is_err());
    }
}
