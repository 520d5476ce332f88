// Processed-event tracking for webhook idempotence
// Keys live in Redis under a TTL comfortably longer than any provider retry
// horizon, so a redelivered event id is recognized and skipped.

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;

use crate::db::RedisPool;

const EVENT_KEY_PREFIX: &str = "stripe:event:";
const EVENT_TTL_SECONDS: u64 = 60 * 60 * 24 * 30;

#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Dedup backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Whether this event id was already processed
    async fn seen(&self, event_id: &str) -> Result<bool, DedupError>;

    /// Mark an event processed. Returns false if another worker marked it
    /// first.
    async fn mark_processed(&self, event_id: &str) -> Result<bool, DedupError>;
}

/// Redis-backed implementation using SET NX EX
#[derive(Clone)]
pub struct RedisEventDedup {
    redis: RedisPool,
}

impl RedisEventDedup {
    pub fn new(redis: RedisPool) -> Self {
        Self { redis }
    }

    fn key(event_id: &str) -> String {
        format!("{}{}", EVENT_KEY_PREFIX, event_id)
    }
}

#[async_trait]
impl ProcessedEventStore for RedisEventDedup {
    #[instrument(skip(self))]
    async fn seen(&self, event_id: &str) -> Result<bool, DedupError> {
        self.redis
            .exists(&Self::key(event_id))
            .await
            .map_err(|e| DedupError::Backend(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn mark_processed(&self, event_id: &str) -> Result<bool, DedupError> {
        self.redis
            .set_nx_ex(&Self::key(event_id), "1", EVENT_TTL_SECONDS)
            .await
            .map_err(|e| DedupError::Backend(e.to_string()))
    }
}
