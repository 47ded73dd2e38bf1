pub mod broker;
pub mod database;
pub mod health;
pub mod memory;
pub mod rbmq;
pub mod redis;
