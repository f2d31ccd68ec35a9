//! Brigade is a minimal message-queue client pair.
//!
//! It provides two independent components built on top of a pluggable broker
//! driver:
//!
//! - [`Producer`] publishes a single message to a named topic and waits for
//!   broker acknowledgment, returning a [`DeliveryReceipt`] with the assigned
//!   partition and offset.
//! - [`Consumer`] subscribes to a topic under a consumer group and runs a
//!   background polling loop: poll, validate, process, commit. The loop
//!   survives transient broker errors with a fixed backoff, stops immediately
//!   on connection-fatal errors, and honors cooperative cancellation at every
//!   suspension point.
//!
//! The broker wire protocol is not part of this crate. Both components talk
//! to a [`BrokerClient`], a black box exposing connect, subscribe, poll,
//! commit, close and produce. [`MemoryBroker`] is an in-process
//! implementation of that seam, useful for local runs and tests.
//!
//! # Consuming
//!
//! ```
//! use std::sync::Arc;
//! use brigade::{Consumer, ConsumerConfig, LogHandler, MemoryBroker};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let broker = Arc::new(MemoryBroker::new());
//! let config = ConsumerConfig::builder()
//!     .bootstrap("localhost:9092")
//!     .topic("test-topic")
//!     .group("test-group")
//!     .build()?;
//!
//! let consumer = Consumer::new(broker);
//! let handle = consumer.start(config, LogHandler).await?;
//! // ... later
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Producing
//!
//! ```
//! use std::sync::Arc;
//! use brigade::{MemoryBroker, Producer, ProducerConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let broker = Arc::new(MemoryBroker::new());
//! let config = ProducerConfig::builder()
//!     .bootstrap("localhost:9092")
//!     .build()?;
//!
//! let producer = Producer::new(broker, config);
//! let receipt = producer.send("test-topic", "hello").await?;
//! println!("delivered to partition {} at offset {}", receipt.partition(), receipt.offset());
//! # Ok(())
//! # }
//! ```

mod error;
mod metrics;

pub mod config;
pub mod consumer;
pub mod driver;
pub mod producer;

pub use config::{BrokerConfig, StartOffset};
pub use consumer::{
    Consumer, ConsumerConfig, ConsumerHandle, LogHandler, MessageHandler, RunState,
};
pub use driver::memory::MemoryBroker;
pub use driver::{
    BrokerClient, BrokerConnection, ConsumedMessage, DriverError, ErrorClass, Message,
};
pub use error::{ClientError, Result};
pub use metrics::ClientMetrics;
pub use producer::{DeliveryError, DeliveryReceipt, Producer, ProducerConfig};

pub use brigade_types::{GroupId, Offset, PartitionId, TopicName};
