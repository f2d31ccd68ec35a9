//! In-process broker driver.
//!
//! Backs both client components with shared process-local state: append-only
//! partition logs, committed offsets per consumer group, and a wakeup event
//! so polls can block with a bounded wait instead of busy-looping.

use std::collections::{HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_lock::Mutex;
use async_trait::async_trait;
use bytes::Bytes;
use event_listener::Event;
use tracing::debug;

use brigade_types::defaults::TOPIC_PARTITION_COUNT;
use brigade_types::{GroupId, Offset, PartitionCount, PartitionId, TopicName};

use crate::config::{BrokerConfig, StartOffset};
use crate::producer::DeliveryReceipt;

use super::{BrokerClient, BrokerConnection, ConsumedMessage, DriverError, Message};

#[derive(Debug, Clone)]
struct StoredRecord {
    key: Option<Bytes>,
    value: Bytes,
}

#[derive(Debug)]
struct Topic {
    partitions: Vec<Vec<StoredRecord>>,
    next_round_robin: usize,
}

impl Topic {
    fn new(partition_count: PartitionCount) -> Self {
        Self {
            partitions: vec![Vec::new(); partition_count.max(1) as usize],
            next_round_robin: 0,
        }
    }
}

struct Shared {
    topics: Mutex<HashMap<TopicName, Topic>>,
    committed: Mutex<HashMap<(GroupId, TopicName, PartitionId), Offset>>,
    faults: Mutex<VecDeque<DriverError>>,
    data_ready: Event,
    connects: AtomicUsize,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            committed: Mutex::new(HashMap::new()),
            faults: Mutex::new(VecDeque::new()),
            data_ready: Event::new(),
            connects: AtomicUsize::new(0),
        }
    }
}

/// An in-process broker.
///
/// Cloning the broker (or sharing it behind an `Arc`) connects producers and
/// consumers to the same topics. Topics are auto-created on first use with
/// [`TOPIC_PARTITION_COUNT`] partitions; use [`MemoryBroker::create_topic`]
/// for more partitions.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_topic(&self, topic: impl Into<TopicName>, partitions: PartitionCount) {
        let mut topics = self.shared.topics.lock().await;
        topics
            .entry(topic.into())
            .or_insert_with(|| Topic::new(partitions));
    }

    /// Queue an error to be returned by the next poll, whichever consumer
    /// issues it. Used to exercise the transient-error recovery path.
    pub async fn inject_consume_error(&self, error: DriverError) {
        self.shared.faults.lock().await.push_back(error);
    }

    /// The next offset `group` will read from `topic`/`partition`, i.e. one
    /// past the last committed record. `None` if the group never committed.
    pub async fn committed_offset(
        &self,
        group: &str,
        topic: &str,
        partition: PartitionId,
    ) -> Option<Offset> {
        let committed = self.shared.committed.lock().await;
        committed
            .get(&(group.to_owned(), topic.to_owned(), partition))
            .copied()
    }

    /// How many connections have been opened against this broker.
    pub fn connections(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerClient for MemoryBroker {
    async fn connect(
        &self,
        config: &BrokerConfig,
    ) -> Result<Box<dyn BrokerConnection>, DriverError> {
        if config.bootstrap.is_empty() {
            return Err(DriverError::Unreachable(
                "no bootstrap address configured".into(),
            ));
        }
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            shared: self.shared.clone(),
            group: config.group_id.clone(),
            start_offset: config.start_offset,
            subscription: None,
            cursors: HashMap::new(),
            open: true,
        }))
    }
}

struct MemoryConnection {
    shared: Arc<Shared>,
    group: Option<GroupId>,
    start_offset: StartOffset,
    subscription: Option<TopicName>,
    cursors: HashMap<PartitionId, Offset>,
    open: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.open {
            Ok(())
        } else {
            Err(DriverError::ConnectionReleased)
        }
    }

    async fn try_take(&mut self, topic: &str) -> Option<ConsumedMessage> {
        let topics = self.shared.topics.lock().await;
        let stored = topics.get(topic)?;
        for (partition, records) in stored.partitions.iter().enumerate() {
            let partition = partition as PartitionId;
            let cursor = self.cursors.get(&partition).copied().unwrap_or(0);
            if let Some(record) = records.get(cursor as usize) {
                self.cursors.insert(partition, cursor + 1);
                return Some(ConsumedMessage::new(
                    topic,
                    partition,
                    cursor,
                    record.key.clone(),
                    Some(record.value.clone()),
                ));
            }
        }
        None
    }
}

#[async_trait]
impl BrokerConnection for MemoryConnection {
    async fn subscribe(&mut self, topic: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        let group = self
            .group
            .clone()
            .ok_or_else(|| DriverError::Broker("consumer group required to subscribe".into()))?;

        let mut topics = self.shared.topics.lock().await;
        let stored = topics
            .entry(topic.to_owned())
            .or_insert_with(|| Topic::new(TOPIC_PARTITION_COUNT));

        // Resume from the group's committed offsets; fall back to the start
        // offset policy for partitions the group never committed.
        let committed = self.shared.committed.lock().await;
        for (partition, records) in stored.partitions.iter().enumerate() {
            let partition = partition as PartitionId;
            let cursor = committed
                .get(&(group.clone(), topic.to_owned(), partition))
                .copied()
                .unwrap_or(match self.start_offset {
                    StartOffset::Earliest => 0,
                    StartOffset::Latest => records.len() as Offset,
                });
            self.cursors.insert(partition, cursor);
        }

        self.subscription = Some(topic.to_owned());
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<ConsumedMessage>, DriverError> {
        self.ensure_open()?;
        let topic = self
            .subscription
            .clone()
            .ok_or_else(|| DriverError::Broker("poll before subscribe".into()))?;

        if let Some(fault) = self.shared.faults.lock().await.pop_front() {
            return Err(fault);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Grab a listener before checking, otherwise a record appended
            // between the check and the wait would be missed until timeout.
            let listener = self.shared.data_ready.listen();
            if let Some(message) = self.try_take(&topic).await {
                return Ok(Some(message));
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if tokio::time::timeout(remaining, listener).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), DriverError> {
        self.ensure_open()?;
        let group = self
            .group
            .clone()
            .ok_or_else(|| DriverError::Broker("commit without a consumer group".into()))?;
        let mut committed = self.shared.committed.lock().await;
        committed.insert(
            (group, message.topic().to_owned(), message.partition()),
            message.offset() + 1,
        );
        Ok(())
    }

    async fn produce(
        &mut self,
        topic: &str,
        message: Message,
    ) -> Result<DeliveryReceipt, DriverError> {
        self.ensure_open()?;
        if topic.is_empty() {
            return Err(DriverError::UnknownTopic(topic.to_owned()));
        }

        let mut topics = self.shared.topics.lock().await;
        let stored = topics
            .entry(topic.to_owned())
            .or_insert_with(|| Topic::new(TOPIC_PARTITION_COUNT));

        let partition_count = stored.partitions.len();
        let partition = match message.key() {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() % partition_count as u64) as usize
            }
            None => {
                let next = stored.next_round_robin;
                stored.next_round_robin = (next + 1) % partition_count;
                next
            }
        };

        let records = &mut stored.partitions[partition];
        let offset = records.len() as Offset;
        records.push(StoredRecord {
            key: message.key().cloned(),
            value: message.value().clone(),
        });
        drop(topics);

        self.shared.data_ready.notify(usize::MAX);
        Ok(DeliveryReceipt::new(partition as PartitionId, offset))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            debug!("memory broker connection closed");
        }
    }
}
