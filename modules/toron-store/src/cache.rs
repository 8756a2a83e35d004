use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::codec::Codable;
use crate::collection::Collection;
use crate::error::CacheError;

/// Produces the value for a cache key from the upstream source. `Ok(None)`
/// means the upstream definitively has nothing for the key.
#[async_trait]
pub trait Producer<V>: Send + Sync {
    type Error: fmt::Display + fmt::Debug + Send + Sync + 'static;

    async fn produce(&self, key: &str) -> Result<Option<V>, Self::Error>;
}

type Staleness<V> = Box<dyn Fn(&str, &V) -> bool + Send + Sync>;

fn never_stale<V>(_key: &str, _value: &V) -> bool {
    false
}

/// Read-through cache: memory, then the persistent collection, then the
/// producer. A hit judged stale by the staleness predicate is produced again
/// and replaces the cached entry in both tiers.
///
/// Concurrent misses on the same key may each call the producer; the last
/// write wins. Producer failures propagate and leave the cache untouched.
pub struct MemoCache<V, P> {
    name: &'static str,
    memory: RwLock<HashMap<String, V>>,
    collection: Collection<V>,
    producer: P,
    is_stale: Staleness<V>,
}

impl<V, P> MemoCache<V, P>
where
    V: Codable + Clone + Send + Sync + 'static,
    P: Producer<V>,
{
    pub fn new(name: &'static str, collection: Collection<V>, producer: P) -> Self {
        Self {
            name,
            memory: RwLock::new(HashMap::new()),
            collection,
            producer,
            is_stale: Box::new(never_stale::<V>),
        }
    }

    pub fn with_staleness(
        mut self,
        is_stale: impl Fn(&str, &V) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_stale = Box::new(is_stale);
        self
    }

    pub async fn get(&self, key: &str) -> Result<Option<V>, CacheError<P::Error>> {
        let in_memory = self.memory.read().await.get(key).cloned();
        if let Some(value) = in_memory {
            if !(self.is_stale)(key, &value) {
                return Ok(Some(value));
            }
            debug!(cache = self.name, key, "Stale in memory");
            return self.produce(key).await;
        }

        if let Some(value) = self.collection.get(key).await? {
            self.memory
                .write()
                .await
                .insert(key.to_string(), value.clone());
            if !(self.is_stale)(key, &value) {
                return Ok(Some(value));
            }
            debug!(cache = self.name, key, "Stale in store");
        }

        self.produce(key).await
    }

    async fn produce(&self, key: &str) -> Result<Option<V>, CacheError<P::Error>> {
        let produced = self
            .producer
            .produce(key)
            .await
            .map_err(CacheError::Producer)?;

        match &produced {
            Some(value) => {
                self.collection.put(key, value).await?;
                self.memory
                    .write()
                    .await
                    .insert(key.to_string(), value.clone());
            }
            None => {
                self.collection.delete(&[key]).await?;
                self.memory.write().await.remove(key);
            }
        }
        Ok(produced)
    }

    /// Cached value without consulting the producer or the staleness predicate.
    pub async fn cached(&self, key: &str) -> Result<Option<V>, CacheError<P::Error>> {
        let in_memory = self.memory.read().await.get(key).cloned();
        if let Some(value) = in_memory {
            return Ok(Some(value));
        }
        let stored = self.collection.get(key).await?;
        if let Some(value) = &stored {
            self.memory
                .write()
                .await
                .insert(key.to_string(), value.clone());
        }
        Ok(stored)
    }

    /// Seed an entry obtained elsewhere, e.g. as a by-product of a search.
    pub async fn insert(&self, key: &str, value: V) -> Result<(), CacheError<P::Error>> {
        self.collection.put(key, &value).await?;
        self.memory.write().await.insert(key.to_string(), value);
        Ok(())
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }
}
