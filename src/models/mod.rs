pub mod health;
pub mod message;
pub mod outcome;
pub mod record;
pub mod retry;
pub mod validation;
