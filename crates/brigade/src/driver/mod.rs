//! The broker driver seam.
//!
//! Brigade does not speak any wire protocol itself. Producers and consumers
//! operate against [`BrokerClient`]/[`BrokerConnection`], which an integrator
//! implements on top of an existing broker client library. The crate ships
//! one implementation, [`memory::MemoryBroker`].

pub mod memory;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use brigade_types::{Offset, PartitionId, Reason, TopicName};

use crate::config::BrokerConfig;
use crate::producer::DeliveryReceipt;

/// Errors reported by a broker driver.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The broker reported a request-scoped problem. The connection itself
    /// is still usable.
    #[error("broker error: {0}")]
    Broker(Reason),
    /// No broker endpoint could be reached.
    #[error("broker unreachable: {0}")]
    Unreachable(Reason),
    /// The broker does not know the topic and refused to create it.
    #[error("unknown topic: {0}")]
    UnknownTopic(TopicName),
    /// An operation was attempted on a connection that is already closed.
    #[error("connection already released")]
    ConnectionReleased,
}

impl DriverError {
    /// Recovery policy for the consume loop: transient errors are retried
    /// after a backoff, fatal errors end the loop immediately.
    pub fn classification(&self) -> ErrorClass {
        match self {
            DriverError::ConnectionReleased => ErrorClass::Fatal,
            DriverError::Broker(_) | DriverError::Unreachable(_) | DriverError::UnknownTopic(_) => {
                ErrorClass::Transient
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.classification() == ErrorClass::Fatal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// An outgoing record: an opaque payload with an optional partitioning key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    key: Option<Bytes>,
    value: Bytes,
}

impl Message {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            key: None,
            value: value.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn key(&self) -> Option<&Bytes> {
        self.key.as_ref()
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Self::new(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Self::new(Bytes::from(value.into_bytes()))
    }
}

impl From<Vec<u8>> for Message {
    fn from(value: Vec<u8>) -> Self {
        Self::new(Bytes::from(value))
    }
}

impl From<Bytes> for Message {
    fn from(value: Bytes) -> Self {
        Self::new(value)
    }
}

/// An incoming record. Always carries its position; the value is optional
/// because client libraries can yield sentinel frames without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    topic: TopicName,
    partition: PartitionId,
    offset: Offset,
    key: Option<Bytes>,
    value: Option<Bytes>,
}

impl ConsumedMessage {
    pub fn new(
        topic: impl Into<TopicName>,
        partition: PartitionId,
        offset: Offset,
        key: Option<Bytes>,
        value: Option<Bytes>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key,
            value,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn key(&self) -> Option<&Bytes> {
        self.key.as_ref()
    }

    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }
}

/// Entry point of a broker driver: opens connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Open a connection using one of the configured bootstrap addresses.
    async fn connect(&self, config: &BrokerConfig) -> Result<Box<dyn BrokerConnection>, DriverError>;
}

/// A live broker connection, exclusively owned by one producer or one
/// consumer session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerConnection: Send {
    /// Join the configured consumer group for `topic`.
    async fn subscribe(&mut self, topic: &str) -> Result<(), DriverError>;

    /// Request the next available record, waiting at most `timeout`.
    /// `Ok(None)` means the wait elapsed without a record.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<ConsumedMessage>, DriverError>;

    /// Record `message`'s offset as processed for the consumer group.
    async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), DriverError>;

    /// Publish `message` to `topic` and wait for broker acknowledgment.
    async fn produce(&mut self, topic: &str, message: Message)
        -> Result<DeliveryReceipt, DriverError>;

    /// Whether the connection is still usable. Pooled connections are
    /// validated with this before reuse.
    fn is_open(&self) -> bool;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self);
}
