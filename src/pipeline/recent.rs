use std::sync::Arc;

use tracing::debug;

use crate::{clients::redis::FastCache, error::PipelineResult};

/// Write and read policy for the recent-notifications list: newest first,
/// capped at `capacity` entries under a single key.
#[derive(Clone)]
pub struct RecentNotifications {
    cache: Arc<dyn FastCache>,
    key: String,
    capacity: usize,
}

impl RecentNotifications {
    pub fn new(cache: Arc<dyn FastCache>, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            cache,
            key: key.into(),
            capacity,
        }
    }

    /// Pushes the message to the front, then trims the list back to capacity.
    pub async fn record(&self, message: &str) -> PipelineResult<()> {
        self.cache.push_front(&self.key, message).await?;
        self.cache.trim(&self.key, self.capacity).await?;

        debug!(key = %self.key, capacity = self.capacity, "Cached in recent notifications");
        Ok(())
    }

    pub async fn recent(&self) -> PipelineResult<Vec<String>> {
        self.cache.range_all(&self.key).await
    }
}
