//! Memoization of list queries.
//!
//! Redis backs the cache when configured; otherwise entries live in-process.
//! Failures are logged and treated as misses.

use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

pub const PLANS_LIST: &str = "plans:list";
pub const TRAINERS_LIST: &str = "trainers:list";
const USER_LIST_KINDS: [&str; 4] = ["user", "trainer", "admin", "all"];

pub fn users_list_key(kind: Option<&str>) -> String {
    format!("users:list:{}", kind.unwrap_or("all"))
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone)]
enum Backend {
    Redis(ConnectionManager),
    Memory(Arc<RwLock<HashMap<String, (Instant, String)>>>),
}

#[derive(Clone)]
pub struct QueryCache {
    backend: Backend,
    ttl: Duration,
    prefix: String,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = if self.is_redis() { "redis" } else { "memory" };
        f.debug_struct("QueryCache")
            .field("backend", &backend)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl QueryCache {
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(HashMap::new()))),
            ttl,
            prefix: "gym:".to_string(),
        }
    }

    /// Connect once; the manager multiplexes and reconnects for every later call.
    pub async fn redis(redis_url: &str, ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self {
            backend: Backend::Redis(manager),
            ttl,
            prefix: "gym:".to_string(),
        })
    }

    /// Redis when a URL is given, in-memory otherwise.
    pub async fn from_url(redis_url: Option<&str>, ttl: Duration) -> Result<Self, CacheError> {
        match redis_url {
            Some(url) if !url.is_empty() => Self::redis(url, ttl).await,
            _ => Ok(Self::in_memory(ttl)),
        }
    }

    fn is_redis(&self) -> bool {
        matches!(self.backend, Backend::Redis(_))
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let raw = match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                redis::cmd("GET")
                    .arg(self.key(key))
                    .query_async::<_, Option<String>>(&mut conn)
                    .await?
            }
            Backend::Memory(entries) => {
                let entries = entries.read().await;
                entries
                    .get(&self.key(key))
                    .filter(|(expires_at, _)| *expires_at > Instant::now())
                    .map(|(_, value)| value.clone())
            }
        };

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;

        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                redis::cmd("SET")
                    .arg(self.key(key))
                    .arg(json)
                    .arg("EX")
                    .arg(self.ttl.as_secs().max(1))
                    .query_async::<_, ()>(&mut conn)
                    .await?;
            }
            Backend::Memory(entries) => {
                let mut entries = entries.write().await;
                let now = Instant::now();
                entries.retain(|_, (expires_at, _)| *expires_at > now);
                entries.insert(self.key(key), (now + self.ttl, json));
            }
        }

        Ok(())
    }

    /// Drop the given keys. Errors are logged.
    pub async fn invalidate(&self, keys: &[&str]) {
        let full_keys: Vec<String> = keys.iter().map(|key| self.key(key)).collect();

        match &self.backend {
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let result = redis::cmd("DEL")
                    .arg(&full_keys)
                    .query_async::<_, i64>(&mut conn)
                    .await;

                if let Err(err) = result {
                    tracing::warn!("Cache invalidation failed for {:?}: {}", keys, err);
                }
            }
            Backend::Memory(entries) => {
                let mut entries = entries.write().await;
                for key in &full_keys {
                    entries.remove(key);
                }
            }
        }
    }

    /// Drop every cached user list and the trainer list.
    pub async fn invalidate_user_lists(&self) {
        let keys: Vec<String> = USER_LIST_KINDS
            .iter()
            .map(|kind| users_list_key(Some(kind)))
            .collect();
        let mut refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        refs.push(TRAINERS_LIST);
        self.invalidate(&refs).await;
    }

    /// Cached value for `key`, or the loader's result (then cached).
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get_json::<T>(key).await {
            Ok(Some(value)) => {
                tracing::debug!(key, "Cache hit");
                return Ok(value);
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(key, "Cache read failed: {}", err),
        }

        let value = loader().await?;

        if let Err(err) = self.set_json(key, &value).await {
            tracing::warn!(key, "Cache write failed: {}", err);
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loader_runs_once_per_ttl() {
        let cache = QueryCache::in_memory(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Vec<u32> = cache
                .get_or_load(PLANS_LIST, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = QueryCache::in_memory(Duration::from_millis(10));
        cache.set_json("k", &"v").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let value: Option<String> = cache.get_json("k").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn invalidating_user_lists_clears_trainers() {
        let cache = QueryCache::in_memory(Duration::from_secs(60));
        cache.set_json(TRAINERS_LIST, &vec!["t"]).await.unwrap();
        cache.set_json(&users_list_key(Some("user")), &vec!["u"]).await.unwrap();
        cache.set_json(PLANS_LIST, &vec!["p"]).await.unwrap();

        cache.invalidate_user_lists().await;

        assert!(cache.get_json::<Vec<String>>(TRAINERS_LIST).await.unwrap().is_none());
        assert!(cache.get_json::<Vec<String>>("users:list:user").await.unwrap().is_none());
        assert!(cache.get_json::<Vec<String>>(PLANS_LIST).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_url_falls_back_to_memory() {
        let cache = QueryCache::from_url(None, Duration::from_secs(60)).await.unwrap();
        assert!(!cache.is_redis());

        let cache = QueryCache::from_url(Some(""), Duration::from_secs(60)).await.unwrap();
        assert!(!cache.is_redis());
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache = QueryCache::in_memory(Duration::from_secs(60));

        let failed: Result<Vec<u8>, &str> = cache.get_or_load("k", || async { Err("boom") }).await;
        assert_eq!(failed, Err("boom"));
        assert!(cache.get_json::<Vec<u8>>("k").await.unwrap().is_none());
    }
}
