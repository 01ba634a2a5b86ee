//! Redis task cache backend.
//!
//! Entries are JSON strings written with `SET .. EX`; the index is a plain set with no
//! expiry. Multi-key reads go through a single pipeline.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, cmd, pipe};
use tracing::{debug, info};

use crate::cache::{BulkGet, CacheError, CacheKeys, TaskCache};
use crate::domain::entities::TaskRecord;

pub struct RedisTaskCache {
    connection: ConnectionManager,
    keys: CacheKeys,
}

impl RedisTaskCache {
    pub async fn connect(url: &str, keys: CacheKeys) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(unavailable)?;
        let connection = ConnectionManager::new(client).await.map_err(unavailable)?;
        info!(
            target = "taskflow::cache::redis",
            index_key = %keys.index(),
            "connected to redis"
        );
        Ok(Self { connection, keys })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn unavailable(err: RedisError) -> CacheError {
    CacheError::unavailable(err)
}

#[async_trait]
impl TaskCache for RedisTaskCache {
    async fn set(&self, task: &TaskRecord, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(task).map_err(CacheError::codec)?;
        let mut conn = self.connection();
        let _: () = cmd("SET")
            .arg(self.keys.task(&task.id))
            .arg(payload)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), CacheError> {
        let mut conn = self.connection();
        let _: () = cmd("DEL")
            .arg(self.keys.task(id))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn bulk_get(&self, ids: &[String]) -> Result<BulkGet, CacheError> {
        if ids.is_empty() {
            return Ok(BulkGet::default());
        }

        let mut pipeline = pipe();
        for id in ids {
            pipeline.cmd("GET").arg(self.keys.task(id));
        }
        let mut conn = self.connection();
        let payloads: Vec<Option<String>> =
            pipeline.query_async(&mut conn).await.map_err(unavailable)?;

        let mut result = BulkGet::default();
        for (id, payload) in ids.iter().zip(payloads) {
            match payload.map(|raw| serde_json::from_str::<TaskRecord>(&raw)) {
                Some(Ok(task)) => result.hits.push(task),
                Some(Err(err)) => {
                    debug!(
                        target = "taskflow::cache::redis",
                        task_id = %id,
                        error = %err,
                        "undecodable cache entry treated as miss"
                    );
                    result.misses.push(id.clone());
                }
                None => result.misses.push(id.clone()),
            }
        }
        Ok(result)
    }

    async fn index_add(&self, id: &str) -> Result<(), CacheError> {
        let mut conn = self.connection();
        let _: () = cmd("SADD")
            .arg(self.keys.index())
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn index_remove(&self, id: &str) -> Result<(), CacheError> {
        let mut conn = self.connection();
        let _: () = cmd("SREM")
            .arg(self.keys.index())
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn index_members(&self) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection();
        let members: Vec<String> = cmd("SMEMBERS")
            .arg(self.keys.index())
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(members)
    }

    async fn index_replace(&self, ids: &[String]) -> Result<(), CacheError> {
        let index = self.keys.index();
        let mut pipeline = pipe();
        pipeline.atomic().cmd("DEL").arg(&index).ignore();
        if !ids.is_empty() {
            pipeline.cmd("SADD").arg(&index).arg(ids).ignore();
        }
        let mut conn = self.connection();
        let _: () = pipeline.query_async(&mut conn).await.map_err(unavailable)?;
        Ok(())
    }
}
