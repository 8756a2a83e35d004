use std::collections::HashSet;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::{KeyValueStore, ScanPage};
use crate::error::Result;

/// Redis-backed store. The connection manager reconnects on its own and is
/// cheap to clone, so each call works on a clone.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!("Connected to Redis");
        Ok(Self { conn })
    }
}

/// Escape glob metacharacters so a prefix matches literally in `SCAN MATCH`.
fn glob_escape(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('*');
    out
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET").arg(key).arg(value).query_async(&mut conn).await?;
        Ok(())
    }

    async fn mset(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("MSET");
        for (key, value) in &entries {
            cmd.arg(key).arg(value.as_slice());
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn exists(&self, keys: &[String]) -> Result<bool> {
        // EXISTS counts a repeated key once per mention
        let unique: HashSet<&String> = keys.iter().collect();
        if unique.is_empty() {
            return Ok(true);
        }
        let mut conn = self.conn.clone();
        let found: usize = redis::cmd("EXISTS")
            .arg(unique.iter().map(|k| k.as_str()).collect::<Vec<_>>())
            .query_async(&mut conn)
            .await?;
        Ok(found == unique.len())
    }

    async fn scan(&self, prefix: &str, cursor: Option<&str>, count: usize) -> Result<ScanPage> {
        let mut conn = self.conn.clone();
        let (next, keys): (String, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor.unwrap_or("0"))
            .arg("MATCH")
            .arg(glob_escape(prefix))
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let values = self.mget(&keys).await?;
        // Keys deleted between SCAN and MGET come back as nil.
        let entries = keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();

        Ok(ScanPage {
            entries,
            cursor: (next != "0").then_some(next),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_glob_is_literal() {
        assert_eq!(glob_escape("post:"), "post:*");
        assert_eq!(glob_escape("a*b?[c]"), "a\\*b\\?\\[c\\]*");
    }
}
