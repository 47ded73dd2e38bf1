use std::{collections::HashMap, future::Future, sync::Arc, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{broker::BrokerClient, database::DurableStore, redis::FastCache},
    error::PipelineResult,
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

pub struct HealthChecker {
    store: Arc<dyn DurableStore>,
    cache: Arc<dyn FastCache>,
    broker: Arc<dyn BrokerClient>,
}

impl HealthChecker {
    pub fn new(
        store: Arc<dyn DurableStore>,
        cache: Arc<dyn FastCache>,
        broker: Arc<dyn BrokerClient>,
    ) -> Self {
        Self {
            store,
            cache,
            broker,
        }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let db_health = Self::check_service("database", self.store.health_check()).await;
        checks.insert("database".to_string(), db_health);

        let mut cache_health = Self::check_service("cache_service", self.cache.health_check()).await;
        if let Some(error) = cache_health.error.take() {
            cache_health = ServiceHealth::degraded(error);
        }
        checks.insert("cache_service".to_string(), cache_health);

        let broker_health = Self::check_service("message_broker", self.broker.health_check()).await;
        checks.insert("message_broker".to_string(), broker_health);

        HealthCheckResponse {
            status: Self::determine_overall_status(&checks),
            timestamp: Utc::now(),
            checks,
        }
    }

    async fn check_service<F>(service: &str, check: F) -> ServiceHealth
    where
        F: Future<Output = PipelineResult<()>>,
    {
        let start = Instant::now();

        match check.await {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(service, response_time_ms = elapsed, "Health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(service, error = %e, "Health check failed");
                ServiceHealth::unhealthy(e.to_string())
            }
        }
    }

    fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
        let has_unhealthy = checks
            .values()
            .any(|health| health.status == HealthStatus::Unhealthy);

        let has_degraded = checks
            .values()
            .any(|health| health.status == HealthStatus::Degraded);

        if has_unhealthy {
            HealthStatus::Unhealthy
        } else if has_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
