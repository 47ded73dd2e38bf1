use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    error::{PipelineError, PipelineResult},
    models::record::{CreateNotificationRecord, NotificationRecord},
};

/// Append-only record store for successfully processed notifications.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn insert(&self, record: CreateNotificationRecord) -> PipelineResult<Uuid>;

    async fn find_all(&self) -> PipelineResult<Vec<NotificationRecord>>;

    async fn health_check(&self) -> PipelineResult<()>;
}

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS notification_logs (
        id UUID PRIMARY KEY,
        message TEXT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL
    )
"#;

pub struct DatabaseClient {
    client: Client,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> PipelineResult<Self> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| PipelineError::Connection(format!("Failed to connect to database: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        client
            .batch_execute(CREATE_TABLE)
            .await
            .map_err(|e| PipelineError::Connection(format!("Failed to prepare schema: {}", e)))?;

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    fn row_to_record(row: &Row) -> PipelineResult<NotificationRecord> {
        let id: Uuid = row
            .try_get("id")
            .map_err(|e| PipelineError::StoreRead(e.to_string()))?;
        let message: String = row
            .try_get("message")
            .map_err(|e| PipelineError::StoreRead(e.to_string()))?;
        let timestamp: DateTime<Utc> = row
            .try_get("timestamp")
            .map_err(|e| PipelineError::StoreRead(e.to_string()))?;

        Ok(NotificationRecord {
            id,
            message,
            timestamp,
        })
    }
}

#[async_trait]
impl DurableStore for DatabaseClient {
    async fn insert(&self, record: CreateNotificationRecord) -> PipelineResult<Uuid> {
        let id = Uuid::new_v4();

        self.client
            .execute(
                "INSERT INTO notification_logs (id, message, timestamp) VALUES ($1, $2, $3)",
                &[&id, &record.message, &record.timestamp],
            )
            .await
            .map_err(|e| {
                error!(error = %e, record_id = %id, "Failed to write notification record");
                PipelineError::StoreWrite(e.to_string())
            })?;

        debug!(record_id = %id, "Notification record written to database");

        Ok(id)
    }

    async fn find_all(&self) -> PipelineResult<Vec<NotificationRecord>> {
        let rows = self
            .client
            .query(
                "SELECT id, message, timestamp FROM notification_logs ORDER BY timestamp, id",
                &[],
            )
            .await
            .map_err(|e| PipelineError::StoreRead(e.to_string()))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn health_check(&self) -> PipelineResult<()> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| PipelineError::StoreRead(format!("Database health check failed: {}", e)))?;

        Ok(())
    }
}
