//! Async dispatch queue and cross-worker rate-limit coordination
//!
//! Both ride on Redis when it is configured and reachable. The rate-limit
//! key `rate_limit:<channel>` holds a wall-clock deadline with a TTL of
//! `retry_after + 5` seconds; every worker checks it before sending. Without
//! Redis the coordinator degrades to an in-process map, which is correct for
//! the synchronous single-worker fallback.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::NotificationError;

const RATE_LIMIT_PREFIX: &str = "notification:rate_limit:";
const QUEUE_KEY: &str = "notifications";
/// Safety margin added to the key TTL over the retry-after window
const RATE_LIMIT_TTL_MARGIN_SECS: u64 = 5;

/// Full payload of one queued notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTask {
    pub notification_id: String,
    pub channel_type: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub metadata: Value,
    pub user_id: String,
    pub job_match_id: Option<i64>,
    pub event_type: String,
    pub allow_resend: bool,
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

enum CoordinatorBackend {
    Redis(redis::Client),
    Local(Mutex<HashMap<String, Instant>>),
}

/// Shared rate-limit state across notification workers.
///
/// When any worker's channel reports a rate limit, it writes the deadline;
/// all workers wait `min(deadline - now, max_wait_seconds)` before sending.
pub struct RateLimitCoordinator {
    backend: CoordinatorBackend,
    max_wait_seconds: u64,
}

impl RateLimitCoordinator {
    pub fn redis(client: redis::Client, max_wait_seconds: u64) -> Self {
        Self {
            backend: CoordinatorBackend::Redis(client),
            max_wait_seconds,
        }
    }

    pub fn local(max_wait_seconds: u64) -> Self {
        Self {
            backend: CoordinatorBackend::Local(Mutex::new(HashMap::new())),
            max_wait_seconds,
        }
    }

    /// Record a rate limit for a channel with the given retry-after window
    pub async fn set_rate_limit(&self, channel_type: &str, retry_after_secs: u64) {
        match &self.backend {
            CoordinatorBackend::Redis(client) => {
                let key = format!("{}{}", RATE_LIMIT_PREFIX, channel_type);
                let deadline = epoch_seconds() + retry_after_secs as f64;
                let ttl = retry_after_secs + RATE_LIMIT_TTL_MARGIN_SECS;
                match client.get_multiplexed_async_connection().await {
                    Ok(mut conn) => {
                        let result: redis::RedisResult<()> =
                            conn.set_ex(&key, deadline.to_string(), ttl).await;
                        if let Err(e) = result {
                            log::warn!("Failed to store rate limit key: {}", e);
                        }
                    }
                    Err(e) => log::warn!("Redis unavailable for rate limit: {}", e),
                }
            }
            CoordinatorBackend::Local(map) => {
                let deadline = Instant::now() + Duration::from_secs(retry_after_secs);
                map.lock()
                    .expect("rate limit map poisoned")
                    .insert(channel_type.to_string(), deadline);
            }
        }
    }

    /// Seconds to wait before sending on this channel; 0 when unlimited.
    /// Capped at `max_wait_seconds`.
    pub async fn get_wait_time(&self, channel_type: &str) -> f64 {
        let remaining = match &self.backend {
            CoordinatorBackend::Redis(client) => {
                let key = format!("{}{}", RATE_LIMIT_PREFIX, channel_type);
                match client.get_multiplexed_async_connection().await {
                    Ok(mut conn) => {
                        let stored: redis::RedisResult<Option<String>> = conn.get(&key).await;
                        match stored {
                            Ok(Some(deadline)) => deadline
                                .parse::<f64>()
                                .map(|d| d - epoch_seconds())
                                .unwrap_or(0.0),
                            _ => 0.0,
                        }
                    }
                    Err(_) => 0.0,
                }
            }
            CoordinatorBackend::Local(map) => {
                let map = map.lock().expect("rate limit map poisoned");
                map.get(channel_type)
                    .map(|deadline| {
                        deadline
                            .saturating_duration_since(Instant::now())
                            .as_secs_f64()
                    })
                    .unwrap_or(0.0)
            }
        };

        remaining.max(0.0).min(self.max_wait_seconds as f64)
    }
}

/// Redis-list-backed notification queue
pub struct NotificationQueue {
    client: redis::Client,
}

impl NotificationQueue {
    /// Connect and validate with a ping; returns None when Redis is down so
    /// the caller can fall back to synchronous dispatch.
    pub async fn connect(redis_url: &str) -> Option<Self> {
        let client = match redis::Client::open(redis_url) {
            Ok(client) => client,
            Err(e) => {
                log::error!("Invalid Redis URL: {}", e);
                return None;
            }
        };
        match client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let pong: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                match pong {
                    Ok(_) => {
                        log::info!("Notification queue connected to Redis");
                        Some(Self { client })
                    }
                    Err(e) => {
                        log::error!("Redis ping failed: {}. Falling back to sync mode.", e);
                        None
                    }
                }
            }
            Err(e) => {
                log::error!("Redis connection failed: {}. Falling back to sync mode.", e);
                None
            }
        }
    }

    pub fn client(&self) -> redis::Client {
        self.client.clone()
    }

    pub async fn enqueue(&self, task: &NotificationTask) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(task)
            .map_err(|e| NotificationError::QueueUnavailable(e.to_string()))?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| NotificationError::QueueUnavailable(e.to_string()))?;
        let _: () = conn
            .rpush(QUEUE_KEY, payload)
            .await
            .map_err(|e| NotificationError::QueueUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Blocking pop with a timeout; None when the queue stayed empty
    pub async fn dequeue(
        &self,
        timeout_secs: u64,
    ) -> Result<Option<NotificationTask>, NotificationError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| NotificationError::QueueUnavailable(e.to_string()))?;
        let popped: Option<(String, String)> = conn
            .blpop(QUEUE_KEY, timeout_secs as f64)
            .await
            .map_err(|e| NotificationError::QueueUnavailable(e.to_string()))?;

        match popped {
            Some((_, payload)) => {
                let task = serde_json::from_str(&payload).map_err(|e| {
                    NotificationError::QueueUnavailable(format!("corrupt task payload: {}", e))
                })?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_coordinator_caps_wait_at_max() {
        let coordinator = RateLimitCoordinator::local(30);
        assert_eq!(coordinator.get_wait_time("telegram").await, 0.0);

        coordinator.set_rate_limit("telegram", 120).await;
        let wait = coordinator.get_wait_time("telegram").await;
        assert!(wait > 25.0, "wait = {}", wait);
        assert!(wait <= 30.0, "wait = {}", wait);

        // Other channels are unaffected
        assert_eq!(coordinator.get_wait_time("email").await, 0.0);
    }

    #[tokio::test]
    async fn local_coordinator_wait_decays() {
        let coordinator = RateLimitCoordinator::local(300);
        coordinator.set_rate_limit("email", 1).await;
        let first = coordinator.get_wait_time("email").await;
        assert!(first > 0.0 && first <= 1.0);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(coordinator.get_wait_time("email").await, 0.0);
    }

    #[test]
    fn task_payload_roundtrips_through_json() {
        let task = NotificationTask {
            notification_id: "n1".to_string(),
            channel_type: "email".to_string(),
            recipient: "u@x.com".to_string(),
            subject: "S".to_string(),
            body: "B".to_string(),
            metadata: serde_json::json!({"score": 88.0}),
            user_id: "u1".to_string(),
            job_match_id: Some(7),
            event_type: "new_match".to_string(),
            allow_resend: true,
        };
        let payload = serde_json::to_string(&task).unwrap();
        let parsed: NotificationTask = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.job_match_id, Some(7));
        assert_eq!(parsed.channel_type, "email");
    }
}
