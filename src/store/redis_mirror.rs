use anyhow::{Context, Result};
use redis::AsyncCommands;

use super::Tables;
use crate::types::RedisPool;

const SCAN_BATCH: usize = 200;

/// Write-through copy of every committed record, one JSON string per key
/// `{prefix}:{kind}:{id}`.
#[derive(Clone)]
pub struct RedisMirror {
    pool: RedisPool,
    prefix: String,
}

impl RedisMirror {
    pub fn new(pool: RedisPool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(redis_url: &str, prefix: impl Into<String>) -> Result<Self> {
        let manager = bb8_redis::RedisConnectionManager::new(redis_url)
            .context("Failed to create Redis connection manager")?;
        let pool = RedisPool::builder()
            .build(manager)
            .await
            .context("Failed to build Redis pool")?;
        Ok(Self::new(pool, prefix))
    }

    pub fn key(&self, kind: &str, id: i64) -> String {
        format!("{}:{}:{}", self.prefix, kind, id)
    }

    /// Splits a mirror key back into kind and id.
    fn parse_key<'k>(&self, key: &'k str) -> Option<(&'k str, i64)> {
        let rest = key.strip_prefix(&self.prefix)?.strip_prefix(':')?;
        let (kind, id) = rest.rsplit_once(':')?;
        Some((kind, id.parse().ok()?))
    }

    /// Applies all writes in one MULTI/EXEC. `None` deletes the key.
    pub async fn write(&self, records: Vec<(String, Option<String>)>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get Redis connection")?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in &records {
            if let Some(json) = value {
                pipe.set(key, json).ignore();
            } else {
                pipe.del(key).ignore();
            }
        }

        pipe.query_async::<()>(&mut *conn)
            .await
            .context("Failed to write records to Redis")?;

        log::debug!("Mirrored {} records to redis", records.len());
        Ok(())
    }

    pub async fn load_tables(&self) -> Result<Tables> {
        let mut conn = self
            .pool
            .get()
            .await
            .context("Failed to get Redis connection")?;

        let pattern = format!("{}:*", self.prefix);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .context("Failed to scan mirrored records")?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        let mut tables = Tables::default();
        for key in keys {
            let Some((kind, _)) = self.parse_key(&key) else {
                log::warn!("Skipping unrecognized mirror key {key}");
                continue;
            };
            let value: Option<String> = conn
                .get(&key)
                .await
                .with_context(|| format!("Failed to read {key}"))?;
            if let Some(json) = value {
                tables
                    .load_record(kind, &json)
                    .with_context(|| format!("Corrupt mirror record {key}"))?;
            }
        }

        Ok(tables)
    }

    /// Removes every key under this mirror's prefix.
    #[cfg(test)]
    pub async fn clear(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let pattern = format!("{}:*", self.prefix);
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await?;
            if !keys.is_empty() {
                let _: () = conn.del(keys).await?;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(())
    }
}
