pub mod dead_letter;
pub mod recent;
pub mod retry;
pub mod worker;

pub use dead_letter::{DeadLetterHandler, DeadLetterObserver};
pub use recent::RecentNotifications;
pub use retry::RetrySupervisor;
pub use worker::DeliveryWorker;
