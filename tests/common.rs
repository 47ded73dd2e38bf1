use std::{future::Future, sync::Arc, time::Duration};

use notification_service::{
    clients::memory::{InMemoryBroker, InMemoryCache, InMemoryStore},
    config::PipelineSettings,
    models::{
        retry::RetryConfig,
        validation::{ContentValidator, MessageValidator},
    },
    pipeline::{
        DeadLetterHandler, DeadLetterObserver, DeliveryWorker, RecentNotifications,
        RetrySupervisor,
    },
};

pub struct Harness {
    pub settings: PipelineSettings,
    pub broker: InMemoryBroker,
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<InMemoryCache>,
    pub recent: RecentNotifications,
    pub worker: Arc<DeliveryWorker>,
    pub observer: Arc<DeadLetterObserver>,
}

/// Retry settings that keep the suite fast while keeping the doubling schedule.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 20,
        max_delay_ms: 1000,
        backoff_multiplier: 2,
        jitter_ratio: 0.0,
    }
}

pub fn harness(retry: RetryConfig) -> Harness {
    let settings = PipelineSettings::default();
    let validator = Arc::new(ContentValidator::new(settings.poison_pattern.clone()));
    harness_with_validator(retry, validator)
}

pub fn harness_with_validator(
    retry: RetryConfig,
    validator: Arc<dyn MessageValidator>,
) -> Harness {
    let settings = PipelineSettings::default();
    let broker = InMemoryBroker::new();
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());

    let recent = RecentNotifications::new(
        cache.clone(),
        settings.recent_cache_key.clone(),
        settings.recent_cache_capacity,
    );

    let worker = Arc::new(DeliveryWorker::new(
        Arc::new(broker.clone()),
        store.clone(),
        recent.clone(),
        DeadLetterHandler::new(Arc::new(broker.clone()), settings.dead_letter_topic.clone()),
        RetrySupervisor::new(retry),
        validator,
        settings.notification_topic.clone(),
        settings.consumer_group.clone(),
    ));

    let observer = Arc::new(DeadLetterObserver::new(
        Arc::new(broker.clone()),
        settings.dead_letter_topic.clone(),
        settings.dead_letter_group.clone(),
    ));

    Harness {
        settings,
        broker,
        store,
        cache,
        recent,
        worker,
        observer,
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(timeout, async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
