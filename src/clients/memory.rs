//! In-process implementations of the broker, store and cache contracts.
//!
//! Used by the test suite and for running the pipeline without external
//! services. Each type can be switched into a failing mode to exercise the
//! pipeline's error paths.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use uuid::Uuid;

use crate::{
    clients::{
        broker::{Acknowledger, BrokerClient, Delivery, Subscription},
        database::DurableStore,
        redis::FastCache,
    },
    error::{PipelineError, PipelineResult},
    models::record::{CreateNotificationRecord, NotificationRecord},
};

/// Read position of one consumer group. Entries handed out but dropped
/// without an ack wait in `redeliver` and are served before new ones.
#[derive(Default)]
struct GroupCursor {
    next: usize,
    redeliver: VecDeque<usize>,
}

#[derive(Default)]
struct TopicLog {
    entries: Vec<String>,
    groups: HashMap<String, GroupCursor>,
}

#[derive(Default)]
struct BrokerState {
    topics: Mutex<HashMap<String, TopicLog>>,
    published: Notify,
    unavailable: AtomicBool,
    acknowledged: AtomicU64,
}

impl BrokerState {
    // Held only for short synchronous sections, never across an await.
    fn topics(&self) -> MutexGuard<'_, HashMap<String, TopicLog>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_for_group(&self, topic: &str, group_id: &str) -> Option<(usize, String)> {
        let mut topics = self.topics();
        let TopicLog { entries, groups } = topics.entry(topic.to_string()).or_default();
        let cursor = groups.entry(group_id.to_string()).or_default();

        let index = match cursor.redeliver.pop_front() {
            Some(index) => index,
            None if cursor.next < entries.len() => {
                cursor.next += 1;
                cursor.next - 1
            }
            None => return None,
        };

        entries.get(index).cloned().map(|payload| (index, payload))
    }

    fn requeue(&self, topic: &str, group_id: &str, index: usize) {
        {
            let mut topics = self.topics();
            let log = topics.entry(topic.to_string()).or_default();
            let cursor = log.groups.entry(group_id.to_string()).or_default();

            let position = cursor
                .redeliver
                .iter()
                .position(|&queued| queued > index)
                .unwrap_or(cursor.redeliver.len());
            cursor.redeliver.insert(position, index);
        }

        self.published.notify_waiters();
    }
}

/// Log-structured broker: every topic keeps its full history and each
/// consumer group reads it from the beginning through a shared cursor, so
/// slots of the same group compete and separate groups each see everything.
///
/// A delivery dropped without being acknowledged goes back to its group and
/// is handed out again, oldest first.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn published(&self, topic: &str) -> Vec<String> {
        self.state
            .topics()
            .get(topic)
            .map(|log| log.entries.clone())
            .unwrap_or_default()
    }

    pub fn acknowledged(&self) -> u64 {
        self.state.acknowledged.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> PipelineResult<()> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(PipelineError::publish(topic, "broker unavailable"));
        }

        self.state
            .topics()
            .entry(topic.to_string())
            .or_default()
            .entries
            .push(payload.to_string());

        self.state.published.notify_waiters();
        Ok(())
    }

    async fn subscribe(&self, topic: &str, group_id: &str) -> PipelineResult<Subscription> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(PipelineError::subscribe(topic, group_id, "broker unavailable"));
        }

        self.state
            .topics()
            .entry(topic.to_string())
            .or_default()
            .groups
            .entry(group_id.to_string())
            .or_default();

        let seed = (
            Arc::clone(&self.state),
            topic.to_string(),
            group_id.to_string(),
        );

        let deliveries = stream::unfold(seed, |(state, topic, group)| async move {
            loop {
                let next = {
                    let notified = state.published.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();

                    match state.next_for_group(&topic, &group) {
                        Some(next) => Some(next),
                        None => {
                            notified.await;
                            None
                        }
                    }
                };

                if let Some((index, payload)) = next {
                    let acker = MemoryAcker {
                        state: Arc::clone(&state),
                        topic: topic.clone(),
                        group: group.clone(),
                        index,
                        acked: AtomicBool::new(false),
                    };
                    let delivery = Delivery::new(payload, Box::new(acker));
                    return Some((Ok::<_, PipelineError>(delivery), (state, topic, group)));
                }
            }
        });

        Ok(deliveries.boxed())
    }

    async fn health_check(&self) -> PipelineResult<()> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(PipelineError::Connection("broker unavailable".to_string()));
        }
        Ok(())
    }
}

struct MemoryAcker {
    state: Arc<BrokerState>,
    topic: String,
    group: String,
    index: usize,
    acked: AtomicBool,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> PipelineResult<()> {
        if !self.acked.swap(true, Ordering::SeqCst) {
            self.state.acknowledged.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if !self.acked.load(Ordering::SeqCst) {
            self.state.requeue(&self.topic, &self.group, self.index);
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    records: AsyncMutex<Vec<NotificationRecord>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn insert(&self, record: CreateNotificationRecord) -> PipelineResult<Uuid> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PipelineError::StoreWrite("store unavailable".to_string()));
        }

        let id = Uuid::new_v4();
        self.records.lock().await.push(record.into_record(id));
        Ok(id)
    }

    async fn find_all(&self) -> PipelineResult<Vec<NotificationRecord>> {
        Ok(self.records.lock().await.clone())
    }

    async fn health_check(&self) -> PipelineResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCache {
    lists: AsyncMutex<HashMap<String, VecDeque<String>>>,
    fail_writes: AtomicBool,
    pushes: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `push_front` calls so far.
    pub fn push_count(&self) -> u64 {
        self.pushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FastCache for InMemoryCache {
    async fn push_front(&self, key: &str, value: &str) -> PipelineResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PipelineError::CacheWrite("cache unavailable".to_string()));
        }

        self.lists
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn trim(&self, key: &str, max_len: usize) -> PipelineResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PipelineError::CacheWrite("cache unavailable".to_string()));
        }

        if let Some(list) = self.lists.lock().await.get_mut(key) {
            list.truncate(max_len);
        }
        Ok(())
    }

    async fn range_all(&self, key: &str) -> PipelineResult<Vec<String>> {
        let lists = self.lists.lock().await;
        Ok(lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> PipelineResult<()> {
        Ok(())
    }
}
