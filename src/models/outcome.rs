use std::fmt::{Display, Formatter, Result};

use uuid::Uuid;

/// Terminal result of one delivery's retry cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Persisted {
        record_id: Uuid,
        attempts: u32,
        cached: bool,
    },
    DeadLettered {
        attempts: u32,
        reason: String,
        published: bool,
    },
}

impl DeliveryOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, DeliveryOutcome::Persisted { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Persisted { attempts, .. } => *attempts,
            DeliveryOutcome::DeadLettered { attempts, .. } => *attempts,
        }
    }
}

impl Display for DeliveryOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DeliveryOutcome::Persisted { .. } => write!(f, "persisted"),
            DeliveryOutcome::DeadLettered { .. } => write!(f, "dead_lettered"),
        }
    }
}
