//! Notification dispatch orchestration
//!
//! Coordinates deduplication, channel selection, async queueing, retries,
//! and cross-worker rate-limit waits. Dispatch failures never propagate into
//! match persistence; they are recorded on the tracker row and counted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::NotificationConfig;
use crate::db::open_connection;
use crate::errors::{DatabaseError, JobRadarError, NotificationError};
use crate::notify::channels::ChannelFactory;
use crate::notify::queue::{NotificationQueue, NotificationTask, RateLimitCoordinator};
use crate::notify::tracker::{
    AggressiveDeduplicationStrategy, DefaultDeduplicationStrategy, NotificationTrackerService,
};
use crate::orchestrator::StopSignal;
use crate::repository::JobRepository;

const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";
/// Score threshold for the high-priority event type
const PRIORITY_HIGH_SCORE: f64 = 80.0;
/// Consecutive rate-limit failures before a task is recorded failed
const MAX_RATE_LIMIT_RETRIES: u32 = 3;
/// Fallback retry-after when the channel reports none
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub struct NotificationService {
    db_path: PathBuf,
    config: NotificationConfig,
    channels: Arc<ChannelFactory>,
    tracker: Arc<NotificationTrackerService>,
    queue: Option<Arc<NotificationQueue>>,
    rate_limiter: Arc<RateLimitCoordinator>,
    /// Transient-failure backoff schedule; injectable for tests
    transient_backoff_secs: [u64; 3],
    send_counter: std::sync::atomic::AtomicU64,
}

impl NotificationService {
    pub async fn new(db_path: PathBuf, config: NotificationConfig) -> Self {
        let strategy: Box<dyn crate::notify::tracker::DeduplicationStrategy> =
            if config.deduplication_enabled {
                Box::new(DefaultDeduplicationStrategy::new(
                    config.resend_interval_hours,
                ))
            } else {
                // Dedup disabled still records sends; the aggressive strategy
                // is only reachable through should_send, which we bypass.
                Box::new(AggressiveDeduplicationStrategy)
            };

        let queue = if config.use_async_queue {
            let redis_url = config
                .redis_url
                .clone()
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
            NotificationQueue::connect(&redis_url).await.map(Arc::new)
        } else {
            log::info!("Async queue disabled via config. Using sync mode.");
            None
        };

        let rate_limiter = match &queue {
            Some(queue) => Arc::new(RateLimitCoordinator::redis(
                queue.client(),
                config.rate_limit_max_wait_seconds,
            )),
            None => Arc::new(RateLimitCoordinator::local(
                config.rate_limit_max_wait_seconds,
            )),
        };

        Self {
            db_path,
            config,
            channels: Arc::new(ChannelFactory::new()),
            tracker: Arc::new(NotificationTrackerService::new(strategy)),
            queue,
            rate_limiter,
            transient_backoff_secs: [30, 60, 120],
            send_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Test constructor: sync mode, no backoff sleeps
    pub fn sync_for_tests(db_path: PathBuf, config: NotificationConfig) -> Self {
        Self {
            db_path,
            channels: Arc::new(ChannelFactory::new()),
            tracker: Arc::new(NotificationTrackerService::new(Box::new(
                DefaultDeduplicationStrategy::new(config.resend_interval_hours),
            ))),
            queue: None,
            rate_limiter: Arc::new(RateLimitCoordinator::local(
                config.rate_limit_max_wait_seconds,
            )),
            config,
            transient_backoff_secs: [0, 0, 0],
            send_counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn channels(&self) -> &ChannelFactory {
        &self.channels
    }

    pub fn async_mode(&self) -> bool {
        self.queue.is_some()
    }

    fn next_notification_id(&self, user_id: &str, channel_type: &str) -> String {
        let counter = self
            .send_counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let seed = format!(
            "{}|{}|{}|{}",
            user_id,
            channel_type,
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            counter
        );
        let digest = Sha256::digest(seed.as_bytes());
        format!("ntf-{:x}", digest)[..20].to_string()
    }

    /// Send a notification with a deduplication check.
    ///
    /// Returns the notification id when sent or queued, None when
    /// suppressed as a duplicate.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_notification(
        &self,
        channel_type: &str,
        recipient: &str,
        subject: &str,
        body: &str,
        user_id: &str,
        job_match_id: Option<i64>,
        event_type: &str,
        metadata: Value,
        allow_resend: bool,
    ) -> Result<Option<String>, JobRadarError> {
        if self.config.deduplication_enabled {
            let conn = open_connection(&self.db_path).map_err(DatabaseError::from)?;
            let repo = JobRepository::new(&conn);
            let should_send = self.tracker.should_send(
                &repo,
                user_id,
                job_match_id,
                event_type,
                channel_type,
                subject,
                body,
                Some(&metadata),
            )?;
            if !should_send {
                log::info!(
                    "Suppressing duplicate notification: {} for {}",
                    event_type,
                    user_id
                );
                return Ok(None);
            }
        }

        let task = NotificationTask {
            notification_id: self.next_notification_id(user_id, channel_type),
            channel_type: channel_type.to_string(),
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            metadata,
            user_id: user_id.to_string(),
            job_match_id,
            event_type: event_type.to_string(),
            allow_resend,
        };
        let notification_id = task.notification_id.clone();

        match &self.queue {
            Some(queue) => {
                queue.enqueue(&task).await?;
                log::info!("Queued notification {}", notification_id);
            }
            None => {
                self.process_notification_task(task).await;
            }
        }

        Ok(Some(notification_id))
    }

    /// Process one notification task: rate-limit coordination, send,
    /// retries, and the tracker record.
    pub async fn process_notification_task(&self, task: NotificationTask) {
        log::info!(
            "Processing notification {} via {}",
            task.notification_id,
            task.channel_type
        );

        let channel = match self.channels.get(&task.channel_type) {
            Ok(channel) => channel,
            Err(e) => {
                log::error!("{}", e);
                self.record_outcome(&task, false, Some(&e.to_string()));
                return;
            }
        };

        let mut rate_limit_retries: u32 = 0;
        let mut transient_attempt: usize = 0;

        loop {
            // Cross-worker rate-limit gate
            let wait = self.rate_limiter.get_wait_time(&task.channel_type).await;
            if wait > 0.0 {
                log::info!(
                    "Global rate limit active for {}. Waiting {:.1}s...",
                    task.channel_type,
                    wait
                );
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;
            }

            match channel
                .send(&task.recipient, &task.subject, &task.body, &task.metadata)
                .await
            {
                Ok(()) => {
                    log::info!("Notification {} sent successfully", task.notification_id);
                    self.record_outcome(&task, true, None);
                    return;
                }
                Err(NotificationError::RateLimited(retry_after)) => {
                    rate_limit_retries += 1;
                    let retry_after = retry_after
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
                        .min(self.config.rate_limit_max_wait_seconds);

                    // Tell every worker to back off this channel
                    self.rate_limiter
                        .set_rate_limit(&task.channel_type, retry_after)
                        .await;

                    if rate_limit_retries > MAX_RATE_LIMIT_RETRIES {
                        log::error!(
                            "Max rate limit retries ({}) exceeded for notification {}",
                            MAX_RATE_LIMIT_RETRIES,
                            task.notification_id
                        );
                        self.record_outcome(
                            &task,
                            false,
                            Some(&format!(
                                "Rate limit exceeded after {} retries",
                                MAX_RATE_LIMIT_RETRIES
                            )),
                        );
                        return;
                    }

                    log::warn!(
                        "Rate limited by {}. Waiting {}s before retry {}/{}",
                        task.channel_type,
                        retry_after,
                        rate_limit_retries,
                        MAX_RATE_LIMIT_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                }
                Err(NotificationError::SendFailed(message))
                    if transient_attempt < self.transient_backoff_secs.len() =>
                {
                    let backoff = self.transient_backoff_secs[transient_attempt];
                    transient_attempt += 1;
                    log::warn!(
                        "Transient send failure for {} ({}). Retry {}/{} in {}s",
                        task.notification_id,
                        message,
                        transient_attempt,
                        self.transient_backoff_secs.len(),
                        backoff
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                }
                Err(e) => {
                    log::error!(
                        "Failed to process notification {}: {}",
                        task.notification_id,
                        e
                    );
                    self.record_outcome(&task, false, Some(&e.to_string()));
                    return;
                }
            }
        }
    }

    fn record_outcome(&self, task: &NotificationTask, success: bool, error: Option<&str>) {
        let result = (|| -> Result<(), DatabaseError> {
            let conn = open_connection(&self.db_path)?;
            let repo = JobRepository::new(&conn);
            self.tracker.record(
                &repo,
                &task.user_id,
                task.job_match_id,
                &task.event_type,
                &task.channel_type,
                &task.recipient,
                &task.subject,
                &task.body,
                Some(&task.metadata),
                success,
                error,
                task.allow_resend,
            )
        })();
        if let Err(e) = result {
            log::error!("Failed to record notification outcome: {}", e);
        }
    }

    /// Spawn the queue worker pool. No-op in sync mode.
    pub fn spawn_workers(
        self: &Arc<Self>,
        worker_count: usize,
        stop: &StopSignal,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let queue = match &self.queue {
            Some(queue) => Arc::clone(queue),
            None => return Vec::new(),
        };

        (0..worker_count.max(1))
            .map(|n| {
                let service = Arc::clone(self);
                let queue = Arc::clone(&queue);
                let stop = stop.clone();
                tokio::spawn(async move {
                    log::info!("Notification worker {} started", n);
                    while !stop.is_set() {
                        match queue.dequeue(2).await {
                            Ok(Some(task)) => service.process_notification_task(task).await,
                            Ok(None) => {}
                            Err(e) => {
                                log::error!("Notification worker {}: {}", n, e);
                                stop.wait(Duration::from_secs(5)).await;
                            }
                        }
                    }
                    log::info!("Notification worker {} stopped", n);
                })
            })
            .collect()
    }

    fn recipient_for(&self, channel_key: &str) -> Option<String> {
        self.config
            .channels
            .get(channel_key)
            .and_then(|c| c.recipient.clone())
    }

    /// Notify all enabled channels about one new match. The caller decides
    /// score thresholds and the notified flag; this only dispatches.
    pub async fn notify_new_match(
        &self,
        user_id: &str,
        match_id: i64,
        job_content: Value,
        overall_score: f64,
    ) -> usize {
        let subject = format!(
            "{} at {}",
            job_content
                .pointer("/job/title")
                .and_then(|v| v.as_str())
                .unwrap_or("New match"),
            job_content
                .pointer("/job/company")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown")
        );
        let event_type = if overall_score >= PRIORITY_HIGH_SCORE {
            "new_high_score_match"
        } else {
            "new_match"
        };

        let mut dispatched = 0;
        for (channel_key, channel_config) in &self.config.channels {
            if !channel_config.enabled {
                continue;
            }
            let recipient = match self.recipient_for(channel_key) {
                Some(recipient) => recipient,
                None => {
                    log::warn!("Channel {} has no recipient configured", channel_key);
                    continue;
                }
            };

            let metadata = json!({
                "job_contents": [job_content.clone()],
                "match_id": match_id,
                "user_id": user_id,
                "score": overall_score,
            });

            match self
                .send_notification(
                    channel_key,
                    &recipient,
                    &subject,
                    "",
                    user_id,
                    Some(match_id),
                    event_type,
                    metadata,
                    true,
                )
                .await
            {
                Ok(Some(_)) => dispatched += 1,
                Ok(None) => {}
                Err(e) => log::error!("Failed to send {} notification: {}", channel_key, e),
            }
        }
        dispatched
    }

    /// Send the batch-completion summary to all enabled channels.
    pub async fn notify_batch_complete(
        &self,
        user_id: &str,
        total_matches: usize,
        high_score_matches: usize,
    ) {
        let subject = format!(
            "Job matching complete: {} great matches found",
            high_score_matches
        );
        let body = format!(
            "Your job matching batch is complete!\n\n\
             Results Summary:\n\
             - Total matches analyzed: {}\n\
             - High-quality matches: {}\n\n\
             View all your matches at: {}\n",
            total_matches, high_score_matches, self.config.base_url
        );

        for (channel_key, channel_config) in &self.config.channels {
            if !channel_config.enabled {
                continue;
            }
            let recipient = match self.recipient_for(channel_key) {
                Some(recipient) => recipient,
                None => continue,
            };
            let metadata = json!({
                "total_matches": total_matches,
                "high_score_matches": high_score_matches,
            });
            if let Err(e) = self
                .send_notification(
                    channel_key,
                    &recipient,
                    &subject,
                    &body,
                    user_id,
                    None,
                    "batch_complete",
                    metadata,
                    true,
                )
                .await
            {
                log::error!("Failed to send batch summary via {}: {}", channel_key, e);
            }
        }
    }
}
