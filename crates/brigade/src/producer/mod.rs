//! The producer: a synchronous send-and-confirm path.
//!
//! Each `send` publishes one message and blocks until the broker acknowledges
//! durability or the configured timeout elapses. The producer keeps no state
//! across calls beyond an optional pooled connection, which is validated
//! before reuse and discarded after any fatal delivery error.

mod config;
mod error;
mod record;

use std::sync::Arc;

use async_lock::Mutex;
use tracing::{debug, error, instrument, warn};

use crate::driver::{BrokerClient, BrokerConnection, DriverError, Message};
use crate::metrics::ClientMetrics;

pub use config::{ProducerConfig, ProducerConfigBuilder};
pub use error::DeliveryError;
pub use record::DeliveryReceipt;

/// An interface for publishing messages to topics on one broker.
pub struct Producer {
    client: Arc<dyn BrokerClient>,
    config: ProducerConfig,
    pooled: Mutex<Option<Box<dyn BrokerConnection>>>,
    metrics: Arc<ClientMetrics>,
}

impl Producer {
    pub fn new(client: Arc<dyn BrokerClient>, config: ProducerConfig) -> Self {
        Self {
            client,
            config,
            pooled: Mutex::new(None),
            metrics: Arc::new(ClientMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<ClientMetrics> {
        self.metrics.clone()
    }

    /// Publish `message` to `topic` and wait for broker acknowledgment.
    ///
    /// On success the returned [`DeliveryReceipt`] carries the assigned
    /// partition and offset. On failure the error carries the broker-supplied
    /// reason; rejected requests keep the connection, timeouts and transport
    /// failures discard it.
    #[instrument(skip(self, message), fields(topic = %topic))]
    pub async fn send(
        &self,
        topic: &str,
        message: impl Into<Message>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        if topic.is_empty() {
            return Err(DeliveryError::EmptyTopic);
        }
        let message = message.into();
        let size = message.value().len() as u64;

        let mut connection = self.lease().await?;

        match tokio::time::timeout(
            self.config.delivery_timeout,
            connection.produce(topic, message),
        )
        .await
        {
            Ok(Ok(receipt)) => {
                debug!(
                    partition = receipt.partition(),
                    offset = receipt.offset(),
                    "delivery acknowledged"
                );
                self.metrics.producer().add_records(1);
                self.metrics.producer().add_bytes(size);
                self.stash(connection).await;
                Ok(receipt)
            }
            Ok(Err(error)) => match error {
                DriverError::Broker(reason) | DriverError::UnknownTopic(reason) => {
                    // request-scoped rejection, the connection is still good
                    warn!(%reason, "broker rejected record");
                    self.stash(connection).await;
                    Err(DeliveryError::Rejected { reason })
                }
                error => {
                    error!(%error, "delivery failed, discarding broker connection");
                    connection.close().await;
                    Err(DeliveryError::Connection(error))
                }
            },
            Err(_) => {
                let timeout = self.config.delivery_timeout;
                error!(?timeout, "delivery timed out, discarding broker connection");
                connection.close().await;
                Err(DeliveryError::Timeout(timeout))
            }
        }
    }

    /// Take the pooled connection if it is still usable, otherwise open a
    /// fresh one. The caller holds the connection exclusively until it is
    /// stashed back.
    async fn lease(&self) -> Result<Box<dyn BrokerConnection>, DeliveryError> {
        if let Some(connection) = self.pooled.lock().await.take() {
            if connection.is_open() {
                return Ok(connection);
            }
            debug!("pooled connection no longer open, discarding");
        }

        let broker_config = self.config.broker_config();
        self.client
            .connect(&broker_config)
            .await
            .map_err(DeliveryError::Connection)
    }

    async fn stash(&self, connection: Box<dyn BrokerConnection>) {
        *self.pooled.lock().await = Some(connection);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::driver::memory::MemoryBroker;
    use crate::driver::testing::{ScriptProbe, ScriptedClient, ScriptedConnection};
    use crate::driver::MockBrokerClient;

    fn config() -> ProducerConfig {
        ProducerConfig::builder()
            .bootstrap("localhost:9092")
            .build()
            .expect("config should build")
    }

    #[tokio::test]
    async fn test_send_returns_receipt_with_assigned_position() {
        //given
        let broker = MemoryBroker::new();
        let producer = Producer::new(Arc::new(broker), config());

        //when
        let receipt = producer
            .send("test-topic", "hello")
            .await
            .expect("delivery should succeed");

        //then
        assert!(receipt.offset() >= 0);
        assert_eq!(receipt.partition(), 0);
        assert_eq!(producer.metrics().producer().records(), 1);
        assert_eq!(producer.metrics().producer().bytes(), 5);
    }

    #[tokio::test]
    async fn test_send_reuses_pooled_connection() {
        //given
        let broker = MemoryBroker::new();
        let producer = Producer::new(Arc::new(broker.clone()), config());

        //when
        producer.send("test-topic", "a").await.expect("first send");
        producer.send("test-topic", "b").await.expect("second send");

        //then: both deliveries went through one connection
        assert_eq!(broker.connections(), 1);
    }

    #[tokio::test]
    async fn test_send_fails_with_broker_reason_when_unreachable() {
        //given
        let client = Arc::new(ScriptedClient::default());
        client.push(Err(DriverError::Unreachable("connection refused".into())));
        let producer = Producer::new(client, config());

        //when
        let error = producer
            .send("test-topic", "hello")
            .await
            .err()
            .expect("delivery should fail");

        //then: no receipt, and the broker reason is carried along
        assert!(matches!(error, DeliveryError::Connection(_)));
        assert!(error.to_string().contains("connection refused"), "{error}");
    }

    #[tokio::test]
    async fn test_send_rejects_empty_topic_without_connecting() {
        //given
        let client = Arc::new(ScriptedClient::default());
        let producer = Producer::new(client.clone(), config());

        //when
        let error = producer.send("", "hello").await.err().expect("must fail");

        //then
        assert!(matches!(error, DeliveryError::EmptyTopic));
        assert_eq!(client.connects(), 0);
    }

    #[tokio::test]
    async fn test_rejection_keeps_connection_pooled() {
        //given: the broker rejects the first record, accepts the second
        let probe = ScriptProbe::shared();
        let connection = ScriptedConnection::new(probe.clone())
            .produce_result(Err(DriverError::UnknownTopic("nope".into())))
            .produce_result(Ok(DeliveryReceipt::new(0, 7)));
        let client = Arc::new(ScriptedClient::with_connection(connection));
        let producer = Producer::new(client.clone(), config());

        //when
        let first = producer.send("test-topic", "a").await;
        let second = producer.send("test-topic", "b").await;

        //then: the rejection did not cost the connection
        assert!(matches!(first, Err(DeliveryError::Rejected { .. })));
        assert_eq!(second.expect("second send").offset(), 7);
        assert_eq!(client.connects(), 1);
        assert_eq!(probe.closes(), 0);
    }

    #[tokio::test]
    async fn test_timeout_discards_connection() {
        //given: acknowledgments take longer than the delivery timeout
        let probe = ScriptProbe::shared();
        let slow = ScriptedConnection::new(probe.clone())
            .delay_produce(Duration::from_millis(200))
            .produce_result(Ok(DeliveryReceipt::new(0, 0)));
        let client = Arc::new(ScriptedClient::with_connection(slow));
        client.push(Ok(ScriptedConnection::new(probe.clone())
            .produce_result(Ok(DeliveryReceipt::new(0, 0)))));

        let config = ProducerConfig::builder()
            .bootstrap("localhost:9092")
            .delivery_timeout(Duration::from_millis(50))
            .build()
            .expect("config should build");
        let producer = Producer::new(client.clone(), config);

        //when
        let first = producer.send("test-topic", "a").await;
        let second = producer.send("test-topic", "b").await;

        //then: the timed-out connection was discarded and rebuilt
        assert!(matches!(first, Err(DeliveryError::Timeout(_))));
        assert!(second.is_ok());
        assert_eq!(probe.closes(), 1);
        assert_eq!(client.connects(), 2);
    }

    #[tokio::test]
    async fn test_connect_uses_groupless_broker_config() {
        //given
        let mut client = MockBrokerClient::new();
        client
            .expect_connect()
            .withf(|config| {
                config.group_id.is_none() && config.bootstrap == ["localhost:9092"]
            })
            .times(1)
            .returning(|_| Err(DriverError::Unreachable("mock".into())));
        let producer = Producer::new(Arc::new(client), config());

        //when
        let result = producer.send("test-topic", "x").await;

        //then
        assert!(matches!(result, Err(DeliveryError::Connection(_))));
    }

    #[tokio::test]
    async fn test_pooled_connection_is_validated_before_reuse() {
        //given: a pooled connection that dies while idle
        let probe = ScriptProbe::shared();
        let connection = ScriptedConnection::new(probe.clone())
            .produce_result(Ok(DeliveryReceipt::new(0, 0)));
        let client = Arc::new(ScriptedClient::with_connection(connection));
        client.push(Ok(ScriptedConnection::new(ScriptProbe::shared())
            .produce_result(Ok(DeliveryReceipt::new(0, 1)))));
        let producer = Producer::new(client.clone(), config());

        producer.send("test-topic", "a").await.expect("first send");

        //when: the broker drops the idle connection
        probe.open.store(false, Ordering::SeqCst);
        let receipt = producer.send("test-topic", "b").await.expect("second send");

        //then: a fresh connection was opened instead of reusing the dead one
        assert_eq!(receipt.offset(), 1);
        assert_eq!(client.connects(), 2);
    }
}
