use serde::{Deserialize, Serialize};

/// Marker prepended to every payload routed to the dead-letter topic.
pub const DEAD_LETTER_PREFIX: &str = "FAILED: ";

/// Body of `POST /notify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueuedResponse {
    pub queued: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueuedResponse {
    pub fn accepted() -> Self {
        Self {
            queued: true,
            error: None,
        }
    }

    pub fn rejected(error: String) -> Self {
        Self {
            queued: false,
            error: Some(error),
        }
    }
}

/// A notification in transit. The broker carries only the raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub payload: String,
}

impl NotificationMessage {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn dead_letter_payload(&self) -> String {
        format!("{}{}", DEAD_LETTER_PREFIX, self.payload)
    }
}
