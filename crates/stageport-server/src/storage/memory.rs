//! In-process object store for tests and local runs

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::ObjectStore;

/// Objects kept in insertion order, which is also the listing order
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
    list_calls: AtomicUsize,
    read_calls: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn with_objects<K, V, I>(objects: I) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        let store = Self::default();
        for (key, content) in objects {
            store.put(key, content);
        }
        store
    }

    /// Insert or replace an object; a replaced object keeps its position
    pub fn put(&self, key: impl Into<String>, content: impl Into<Vec<u8>>) {
        let key = key.into();
        let content = content.into();
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        match objects.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = content,
            None => objects.push((key, content)),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| anyhow!("No such object: {}", key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_in_insertion_order_under_prefix() {
        let store = MemoryObjectStore::with_objects([
            ("uploads/b.txt", "b"),
            ("other/x.txt", "x"),
            ("uploads/a.txt", "a"),
        ]);

        let keys = store.list_objects("uploads/").await.unwrap();

        assert_eq!(keys, vec!["uploads/b.txt", "uploads/a.txt"]);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_object() {
        let store = MemoryObjectStore::default();
        assert!(store.read_object("uploads/none.txt").await.is_err());

        store.put("uploads/a.txt", "a,b\n1,2\n");
        assert_eq!(store.read_object("uploads/a.txt").await.unwrap(), b"a,b\n1,2\n");
        assert_eq!(store.read_calls(), 2);
    }
}
