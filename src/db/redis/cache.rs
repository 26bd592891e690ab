use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Ranked list for one (user, category, limit)
    Recommendations {
        user_id: Uuid,
        category: String,
        limit: u32,
    },
}

impl CacheKey {
    /// Glob matching every cached ranked list of a user in a category
    pub fn recommendations_pattern(user_id: Uuid, category: &str) -> String {
        format!("recs:{}:{}:*", user_id, category)
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Recommendations {
                user_id,
                category,
                limit,
            } => write!(f, "recs:{}:{}:{}", user_id, category, limit),
        }
    }
}

/// Creates a Redis client for caching
///
/// Opening the client does not connect; connections are made per call on
/// the multiplexed async connection.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// SCAN page size used when deleting by pattern
const SCAN_BATCH: usize = 100;

/// Work for the background writer, applied in the order it was queued
enum CacheCommand {
    Write { key: String, value: String, ttl: u64 },
    Invalidate { pattern: String },
}

/// Cache handler for storing and retrieving data from Redis
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheCommand>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Asks the writer task to flush pending writes and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache instance with an async write background task
    ///
    /// Ranked lists are written from the background task so that storing a
    /// result never delays the response that produced it.
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx })
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheCommand>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    tracing::info!("Cache writer shutting down, flushing remaining writes");

                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheCommand) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        match msg {
            CacheCommand::Write { key, value, ttl } => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            CacheCommand::Invalidate { pattern } => {
                Self::delete_matching(&mut conn, &pattern).await?;
            }
        }
        Ok(())
    }

    /// Deletes every key matching `pattern`, walking the keyspace with SCAN
    /// so Redis is never blocked on a full KEYS pass
    async fn delete_matching(
        conn: &mut redis::aio::MultiplexedConnection,
        pattern: &str,
    ) -> AppResult<usize> {
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(conn)
                .await?;

            if !keys.is_empty() {
                let _: () = conn.del(&keys).await?;
                removed += keys.len();
            }

            if next == 0 {
                return Ok(removed);
            }
            cursor = next;
        }
    }

    /// Retrieves and deserializes a cached value, `None` on a miss
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Queues a write for the background task and returns immediately
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheCommand::Write {
            key: key.to_string(),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }

    /// Drops every cached ranked list of a user in a category.
    ///
    /// Called after each profile write. The delete runs immediately and is
    /// queued again behind pending background writes, so a list queued
    /// before the profile write cannot land after it. A ranking that was
    /// still being computed while the profile changed can be cached after
    /// this call; it lives at most one TTL.
    pub async fn invalidate_recommendations(&self, user_id: Uuid, category: &str) -> AppResult<()> {
        let pattern = CacheKey::recommendations_pattern(user_id, category);

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let removed = Self::delete_matching(&mut conn, &pattern).await?;
        tracing::debug!(
            user_id = %user_id,
            category = %category,
            removed,
            "Invalidated cached recommendations"
        );

        if let Err(e) = self.write_tx.send(CacheCommand::Invalidate { pattern }) {
            tracing::error!(error = %e, "Failed to queue cache invalidation");
        }

        Ok(())
    }
}
