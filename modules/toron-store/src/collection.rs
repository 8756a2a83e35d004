use std::collections::BTreeMap;
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use crate::codec::{self, Codable};
use crate::error::Result;
use crate::kv::KeyValueStore;

/// A typed, prefixed view over a shared [`KeyValueStore`].
///
/// Ids are rendered with `Display` and namespaced by `prefix`. Stored values
/// that fail to decode are logged and treated as absent, so one corrupt
/// entry never fails a whole batch.
pub struct Collection<V> {
    store: Arc<dyn KeyValueStore>,
    prefix: &'static str,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for Collection<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            prefix: self.prefix,
            _value: PhantomData,
        }
    }
}

impl<V: Codable> Collection<V> {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: &'static str) -> Self {
        Self {
            store,
            prefix,
            _value: PhantomData,
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn key(&self, id: impl Display) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn keys<K: Display>(&self, ids: &[K]) -> Vec<String> {
        ids.iter().map(|id| self.key(id)).collect()
    }

    fn decode_logged(&self, key: &str, raw: &[u8]) -> Option<V> {
        match codec::decode_any::<V>(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Skipping undecodable entry");
                None
            }
        }
    }

    pub async fn get(&self, id: impl Display) -> Result<Option<V>> {
        let key = self.key(id);
        let raw = self.store.get(&key).await?;
        Ok(raw.and_then(|raw| self.decode_logged(&key, &raw)))
    }

    pub async fn get_many<K: Display>(&self, ids: &[K]) -> Result<Vec<Option<V>>> {
        let keys = self.keys(ids);
        let raws = self.store.mget(&keys).await?;
        Ok(keys
            .iter()
            .zip(raws)
            .map(|(key, raw)| raw.and_then(|raw| self.decode_logged(key, &raw)))
            .collect())
    }

    pub async fn put(&self, id: impl Display, value: &V) -> Result<()> {
        let bytes = codec::encode(value)?;
        self.store.set(&self.key(id), bytes.to_vec()).await
    }

    pub async fn put_many<'a, K: Display + 'a>(
        &self,
        items: impl IntoIterator<Item = (K, &'a V)>,
    ) -> Result<()>
    where
        V: 'a,
    {
        let mut entries = Vec::new();
        for (id, value) in items {
            entries.push((self.key(id), codec::encode(value)?.to_vec()));
        }
        self.store.mset(entries).await
    }

    pub async fn delete<K: Display>(&self, ids: &[K]) -> Result<u64> {
        self.store.del(&self.keys(ids)).await
    }

    pub async fn contains_all<K: Display>(&self, ids: &[K]) -> Result<bool> {
        self.store.exists(&self.keys(ids)).await
    }

    /// One page of `(id, value)` pairs, ids without the prefix. Pass the
    /// returned cursor back in to continue; `None` means the scan is done.
    pub async fn scan_page(
        &self,
        cursor: Option<&str>,
        count: usize,
    ) -> Result<(Vec<(String, V)>, Option<String>)> {
        let page = self.store.scan(self.prefix, cursor, count).await?;
        let items = page
            .entries
            .into_iter()
            .filter_map(|(key, raw)| {
                let value = self.decode_logged(&key, &raw)?;
                let id = key.strip_prefix(self.prefix)?.to_string();
                Some((id, value))
            })
            .collect();
        Ok((items, page.cursor))
    }

    /// Every entry, ordered by id. A backend scan may repeat keys across
    /// pages; each id appears once here.
    pub async fn scan_all(&self, group: usize) -> Result<Vec<(String, V)>> {
        let mut all = BTreeMap::new();
        let mut cursor: Option<String> = None;
        loop {
            let (items, next) = self.scan_page(cursor.as_deref(), group).await?;
            all.extend(items);
            match next {
                Some(next) => cursor = Some(next),
                None => return Ok(all.into_iter().collect()),
            }
        }
    }
}
