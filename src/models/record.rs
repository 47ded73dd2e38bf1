use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A successfully processed notification as held by the durable store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Insert payload; the store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct CreateNotificationRecord {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CreateNotificationRecord {
    pub fn new(message: String) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn into_record(self, id: Uuid) -> NotificationRecord {
        NotificationRecord {
            id,
            message: self.message,
            timestamp: self.timestamp,
        }
    }
}
