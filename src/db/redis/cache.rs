use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, AppResult};

/// Everything the service keeps in Redis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    AdminStats,
    Genres,
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = match self {
            CacheKey::AdminStats => "bookworm:admin:stats",
            CacheKey::Genres => "bookworm:genres",
        };
        f.write_str(key)
    }
}

pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

/// Pending mutation for the writer task
#[derive(Debug)]
enum Write {
    /// `loaded_at` is the invalidation generation the value was read under
    Put {
        key: CacheKey,
        json: String,
        ttl: u64,
        loaded_at: u64,
    },
    Evict {
        key: CacheKey,
    },
}

impl Write {
    /// A put whose value was loaded before the latest invalidation
    fn is_stale(&self, generation: u64) -> bool {
        matches!(self, Write::Put { loaded_at, .. } if *loaded_at != generation)
    }

    async fn apply(self, conn: &mut ConnectionManager, generation: &AtomicU64) -> AppResult<()> {
        if self.is_stale(generation.load(Ordering::SeqCst)) {
            tracing::debug!(write = ?self, "Skipping cache fill loaded before an invalidation");
            return Ok(());
        }
        match self {
            Write::Put { key, json, ttl, .. } => {
                conn.set_ex::<_, _, ()>(key.to_string(), json, ttl).await?
            }
            Write::Evict { key } => conn.del::<_, ()>(key.to_string()).await?,
        }
        Ok(())
    }
}

/// JSON read-through cache over a shared Redis connection
///
/// Reads and invalidations hit Redis directly. Fills are queued to a single
/// background task so request handlers never wait on them. Every
/// invalidation bumps a generation counter, and fills loaded under an older
/// generation are dropped instead of written.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    writes: mpsc::UnboundedSender<Write>,
    generation: Arc<AtomicU64>,
}

/// Stops the writer task once everything queued so far is applied
pub struct CacheWriterHandle {
    stop: oneshot::Sender<()>,
    done: tokio::task::JoinHandle<()>,
}

impl CacheWriterHandle {
    pub async fn shutdown(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.done.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    /// Connects to Redis and starts the writer task
    pub async fn connect(client: Client) -> AppResult<(Self, CacheWriterHandle)> {
        let conn = ConnectionManager::new(client).await?;
        let (writes, queue) = mpsc::unbounded_channel();
        let (stop, stopped) = oneshot::channel();
        let generation = Arc::new(AtomicU64::new(0));

        let done = tokio::spawn(run_writer(
            conn.clone(),
            Arc::clone(&generation),
            queue,
            stopped,
        ));

        let cache = Self {
            conn,
            writes,
            generation,
        };
        Ok((cache, CacheWriterHandle { stop, done }))
    }

    /// Current invalidation generation; capture it before loading a value
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cached value for `key`, or `None` on a miss
    pub async fn get_from_cache<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(key.to_string()).await?;

        json.map(|json| {
            serde_json::from_str(&json)
                .map_err(|e| AppError::Internal(format!("Corrupt cache entry {}: {}", key, e)))
        })
        .transpose()
    }

    /// Queues `value` to be stored under `key` for `ttl` seconds
    ///
    /// Dropped if the cache was invalidated after `loaded_at`.
    pub fn set_in_background<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: u64,
        loaded_at: u64,
    ) {
        match serde_json::to_string(value) {
            Ok(json) => self.enqueue(Write::Put {
                key: *key,
                json,
                ttl,
                loaded_at,
            }),
            Err(e) => tracing::error!(%key, error = %e, "Cache serialization failed"),
        }
    }

    /// Removes `key` before returning
    ///
    /// A second eviction is queued behind any fill the writer is already
    /// applying.
    pub async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut conn = self.conn.clone();
        let deleted = conn.del::<_, ()>(key.to_string()).await;
        self.enqueue(Write::Evict { key: *key });
        deleted.map_err(AppError::from)
    }

    fn enqueue(&self, write: Write) {
        if self.writes.send(write).is_err() {
            tracing::warn!("Cache writer has stopped; dropping cache write");
        }
    }
}

async fn run_writer(
    mut conn: ConnectionManager,
    generation: Arc<AtomicU64>,
    mut queue: mpsc::UnboundedReceiver<Write>,
    mut stopped: oneshot::Receiver<()>,
) {
    tracing::debug!("Cache writer started");

    loop {
        tokio::select! {
            write = queue.recv() => match write {
                Some(write) => {
                    if let Err(e) = write.apply(&mut conn, &generation).await {
                        tracing::error!(error = %e, "Cache write failed");
                    }
                }
                None => break,
            },
            _ = &mut stopped => {
                queue.close();
                let mut flushed = 0usize;
                while let Some(write) = queue.recv().await {
                    if let Err(e) = write.apply(&mut conn, &generation).await {
                        tracing::error!(error = %e, "Cache write failed during shutdown");
                    }
                    flushed += 1;
                }
                tracing::info!(flushed, "Cache writer stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys_are_namespaced() {
        assert_eq!(CacheKey::AdminStats.to_string(), "bookworm:admin:stats");
        assert_eq!(CacheKey::Genres.to_string(), "bookworm:genres");
    }

    #[test]
    fn test_only_puts_from_an_older_generation_are_stale() {
        let put = Write::Put {
            key: CacheKey::Genres,
            json: "[]".to_string(),
            ttl: 60,
            loaded_at: 3,
        };
        assert!(!put.is_stale(3));
        assert!(put.is_stale(4));

        let evict = Write::Evict {
            key: CacheKey::Genres,
        };
        assert!(!evict.is_stale(4));
    }

    async fn connect() -> (Cache, CacheWriterHandle) {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        Cache::connect(create_redis_client(&url).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_write_then_invalidate() {
        let (cache, handle) = connect().await;

        let genres = vec!["Mystery".to_string(), "History".to_string()];
        cache.set_in_background(&CacheKey::Genres, &genres, 60, cache.generation());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let hit: Option<Vec<String>> = cache.get_from_cache(&CacheKey::Genres).await.unwrap();
        assert_eq!(hit, Some(genres));

        cache.invalidate(&CacheKey::Genres).await.unwrap();
        let miss: Option<Vec<String>> = cache.get_from_cache(&CacheKey::Genres).await.unwrap();
        assert_eq!(miss, None);
        handle.shutdown().await;
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_fill_loaded_before_invalidation_is_dropped() {
        let (cache, handle) = connect().await;

        let loaded_at = cache.generation();
        cache.invalidate(&CacheKey::Genres).await.unwrap();
        cache.set_in_background(&CacheKey::Genres, &vec!["Stale".to_string()], 60, loaded_at);
        handle.shutdown().await;

        let miss: Option<Vec<String>> = cache.get_from_cache(&CacheKey::Genres).await.unwrap();
        assert_eq!(miss, None);
    }
}
