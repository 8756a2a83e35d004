use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{KeyValueStore, ScanPage};
use crate::error::Result;

/// Ordered in-process store. Scan cursors are the last key returned, so a
/// scan survives interleaved writes and always terminates.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
    flushes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.data.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.lock().await.is_empty()
    }

    /// Copy of every entry, for comparing store states.
    pub async fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.data.lock().await.clone()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let data = self.data.lock().await;
        Ok(keys.iter().map(|k| data.get(k).cloned()).collect())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.data.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn mset(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.data.lock().await.extend(entries);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        let mut data = self.data.lock().await;
        Ok(keys.iter().filter(|k| data.remove(k.as_str()).is_some()).count() as u64)
    }

    async fn exists(&self, keys: &[String]) -> Result<bool> {
        let data = self.data.lock().await;
        Ok(keys.iter().all(|k| data.contains_key(k)))
    }

    async fn scan(&self, prefix: &str, cursor: Option<&str>, count: usize) -> Result<ScanPage> {
        let data = self.data.lock().await;
        let start = match cursor {
            Some(after) => Bound::Excluded(after.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let count = count.max(1);
        let mut entries: Vec<(String, Vec<u8>)> = data
            .range((start, Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(count + 1)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let cursor = if entries.len() > count {
            entries.truncate(count);
            entries.last().map(|(k, _)| k.clone())
        } else {
            None
        };
        Ok(ScanPage { entries, cursor })
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..7 {
            store.set(&format!("post:{i}"), vec![i]).await.unwrap();
        }
        store.set("show:1", vec![9]).await.unwrap();
        store.set("pos", vec![9]).await.unwrap();
        store
    }

    #[tokio::test]
    async fn scan_pages_through_prefix_only() {
        let store = seeded().await;
        let mut cursor: Option<String> = None;
        let mut seen = Vec::new();
        let mut calls = 0;
        loop {
            let page = store.scan("post:", cursor.as_deref(), 3).await.unwrap();
            calls += 1;
            seen.extend(page.entries.into_iter().map(|(k, _)| k));
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 7);
        assert!(seen.iter().all(|k| k.starts_with("post:")));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn batch_calls_match_single_calls() {
        let store = seeded().await;
        let keys = vec!["post:1".to_string(), "nope".to_string(), "post:2".to_string()];
        assert_eq!(
            store.mget(&keys).await.unwrap(),
            vec![Some(vec![1]), None, Some(vec![2])]
        );
        assert!(!store.exists(&keys).await.unwrap());
        assert!(store.exists(&keys[..1]).await.unwrap());
        assert_eq!(store.del(&keys).await.unwrap(), 2);
        assert_eq!(store.get("post:1").await.unwrap(), None);
    }
}
