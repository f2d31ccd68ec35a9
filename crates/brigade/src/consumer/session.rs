use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info};

use brigade_types::{GroupId, Offset, PartitionId, TopicName};

use crate::consumer::ConsumerConfig;
use crate::driver::{BrokerClient, BrokerConnection, ConsumedMessage, DriverError};
use crate::ClientError;

/// Offsets observed for one partition: what was last handed to the handler
/// and what the broker has acknowledged as committed. `last_committed` only
/// advances on commit success, so it never runs ahead of the broker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPosition {
    pub last_seen: Option<Offset>,
    pub last_committed: Option<Offset>,
}

/// The live subscription of one consumer instance.
///
/// Owns exactly one broker connection and the per-partition offset
/// bookkeeping. The connection is released exactly once; the release is
/// unconditional on every loop exit path and calling it again is a no-op.
pub(crate) struct ConsumerSession {
    topic: TopicName,
    group: GroupId,
    connection: Option<Box<dyn BrokerConnection>>,
    positions: BTreeMap<PartitionId, PartitionPosition>,
}

impl ConsumerSession {
    /// Connect and subscribe. Any failure here is a startup failure: the
    /// consumer never entered its loop and holds no resources.
    pub(crate) async fn open(
        client: &dyn BrokerClient,
        config: &ConsumerConfig,
    ) -> Result<Self, ClientError> {
        let broker_config = config.broker_config();
        let mut connection = client
            .connect(&broker_config)
            .await
            .map_err(ClientError::Startup)?;

        if let Err(error) = connection.subscribe(&config.topic).await {
            connection.close().await;
            return Err(ClientError::Startup(error));
        }

        info!(
            topic = %config.topic,
            group = %config.group,
            start_offset = %config.start_offset,
            "subscribed"
        );

        Ok(Self {
            topic: config.topic.clone(),
            group: config.group.clone(),
            connection: Some(connection),
            positions: BTreeMap::new(),
        })
    }

    pub(crate) async fn poll(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ConsumedMessage>, DriverError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(DriverError::ConnectionReleased)?;
        let polled = connection.poll(timeout).await?;
        if let Some(message) = &polled {
            self.positions
                .entry(message.partition())
                .or_default()
                .last_seen = Some(message.offset());
        }
        Ok(polled)
    }

    pub(crate) async fn commit(&mut self, message: &ConsumedMessage) -> Result<(), DriverError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or(DriverError::ConnectionReleased)?;
        connection.commit(message).await?;
        self.positions
            .entry(message.partition())
            .or_default()
            .last_committed = Some(message.offset());
        Ok(())
    }

    /// Release the broker connection. Idempotent: the first call closes the
    /// connection, later calls do nothing.
    pub(crate) async fn release(&mut self) {
        match self.connection.take() {
            Some(mut connection) => {
                connection.close().await;
                info!(
                    topic = %self.topic,
                    group = %self.group,
                    positions = ?self.positions,
                    "broker connection released"
                );
            }
            None => debug!(topic = %self.topic, "connection already released"),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_released(&self) -> bool {
        self.connection.is_none()
    }

    #[cfg(test)]
    pub(crate) fn position(&self, partition: PartitionId) -> PartitionPosition {
        self.positions.get(&partition).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::StartOffset;
    use crate::driver::testing::{message, ScriptProbe, ScriptedClient, ScriptedConnection};
    use crate::driver::DriverError;

    fn config() -> ConsumerConfig {
        ConsumerConfig::builder()
            .bootstrap("localhost:9092")
            .topic("test-topic")
            .group("test-group")
            .start_offset(StartOffset::Earliest)
            .build()
            .expect("config should build")
    }

    #[tokio::test]
    async fn test_open_surfaces_subscribe_failure_and_closes() {
        //given
        let probe = ScriptProbe::shared();
        let connection = ScriptedConnection::new(probe.clone())
            .fail_subscribe(DriverError::UnknownTopic("test-topic".into()));
        let client = ScriptedClient::with_connection(connection);

        //when
        let result = ConsumerSession::open(&client, &config()).await;

        //then
        assert!(matches!(result, Err(ClientError::Startup(_))));
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn test_positions_track_seen_and_committed() {
        //given
        let probe = ScriptProbe::shared();
        let connection = ScriptedConnection::new(probe.clone())
            .deliver(message("test-topic", 0, 0, "a"))
            .deliver(message("test-topic", 0, 1, "b"));
        let client = ScriptedClient::with_connection(connection);
        let mut session = ConsumerSession::open(&client, &config())
            .await
            .expect("session should open");

        //when
        let first = session
            .poll(Duration::from_millis(10))
            .await
            .expect("poll")
            .expect("message");
        session.commit(&first).await.expect("commit");
        let second = session
            .poll(Duration::from_millis(10))
            .await
            .expect("poll")
            .expect("message");

        //then: second message seen but not yet committed
        let position = session.position(0);
        assert_eq!(position.last_seen, Some(second.offset()));
        assert_eq!(position.last_committed, Some(first.offset()));
        assert_eq!(probe.commits(), vec![0]);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        //given
        let probe = ScriptProbe::shared();
        let client = ScriptedClient::with_connection(ScriptedConnection::new(probe.clone()));
        let mut session = ConsumerSession::open(&client, &config())
            .await
            .expect("session should open");

        //when
        session.release().await;
        session.release().await;

        //then: the underlying connection was closed exactly once
        assert!(session.is_released());
        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn test_poll_after_release_is_fatal() {
        //given
        let probe = ScriptProbe::shared();
        let client = ScriptedClient::with_connection(ScriptedConnection::new(probe));
        let mut session = ConsumerSession::open(&client, &config())
            .await
            .expect("session should open");
        session.release().await;

        //when
        let polled = session.poll(Duration::from_millis(10)).await;

        //then
        assert_eq!(polled, Err(DriverError::ConnectionReleased));
        assert!(polled.unwrap_err().is_fatal());
    }
}
