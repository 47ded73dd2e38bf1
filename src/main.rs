use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use notification_service::{
    api::{AppState, run_api_server},
    clients::{
        broker::BrokerClient, database::DatabaseClient, database::DurableStore,
        health::HealthChecker, rbmq::RabbitMqClient, redis::FastCache, redis::RedisClient,
    },
    config::Config,
    models::validation::ContentValidator,
    pipeline::{
        DeadLetterHandler, DeadLetterObserver, DeliveryWorker, RecentNotifications,
        RetrySupervisor,
    },
};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Error> {
    fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let settings = config.pipeline_settings();

    info!(
        topic = %settings.notification_topic,
        dead_letter_topic = %settings.dead_letter_topic,
        workers = config.worker_concurrency,
        "Configuration validated"
    );

    let broker: Arc<dyn BrokerClient> = Arc::new(RabbitMqClient::connect(&config).await?);
    let store: Arc<dyn DurableStore> = Arc::new(DatabaseClient::connect(&config.database_url).await?);
    let cache: Arc<dyn FastCache> = Arc::new(RedisClient::connect(&config).await?);

    let recent = RecentNotifications::new(
        Arc::clone(&cache),
        settings.recent_cache_key.clone(),
        settings.recent_cache_capacity,
    );
    let dead_letters = DeadLetterHandler::new(Arc::clone(&broker), settings.dead_letter_topic.clone());

    let worker = Arc::new(DeliveryWorker::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        recent.clone(),
        dead_letters,
        RetrySupervisor::new(config.retry_config()),
        Arc::new(ContentValidator::new(settings.poison_pattern.clone())),
        settings.notification_topic.clone(),
        settings.consumer_group.clone(),
    ));

    let observer = Arc::new(DeadLetterObserver::new(
        Arc::clone(&broker),
        settings.dead_letter_topic.clone(),
        settings.dead_letter_group.clone(),
    ));

    let mut tasks = JoinSet::new();
    worker.spawn_slots(config.worker_concurrency, &mut tasks);
    observer.spawn_slots(config.dead_letter_concurrency, &mut tasks);

    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(Arc::clone(&store), Arc::clone(&cache), Arc::clone(&broker)),
        broker,
        store,
        recent,
        notification_topic: settings.notification_topic,
    });

    let server = run_api_server(config.server_port, state);
    tokio::pin!(server);

    loop {
        tokio::select! {
            result = &mut server => {
                return result.map_err(|e| anyhow!("Gateway stopped: {}", e));
            }
            finished = tasks.join_next(), if !tasks.is_empty() => {
                match finished {
                    Some(Ok(Ok(()))) => warn!("Consumer slot finished"),
                    Some(Ok(Err(e))) => error!(error = %e, "Consumer slot failed"),
                    Some(Err(e)) => error!(error = %e, "Consumer slot panicked"),
                    None => {}
                }
                if tasks.is_empty() {
                    return Err(anyhow!("All consumer slots stopped"));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, unacknowledged messages will be redelivered");
                tasks.abort_all();
                return Ok(());
            }
        }
    }
}
