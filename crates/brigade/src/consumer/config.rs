use std::time::Duration;

use anyhow::Result;
use derive_builder::Builder;
use once_cell::sync::Lazy;

use brigade_types::defaults::{CONSUMER_POLL_TIMEOUT, CONSUMER_RETRY_INTERVAL};
use brigade_types::{GroupId, TopicName};

use crate::config::{BrokerConfig, StartOffset};
use crate::ClientError;

static DEFAULT_RETRY_INTERVAL: Lazy<Duration> = Lazy::new(|| {
    use std::env;
    let var_value = env::var("BRIGADE_RETRY_INTERVAL_SECS").unwrap_or_default();
    var_value
        .parse::<u64>()
        .map(Duration::from_secs)
        .unwrap_or(CONSUMER_RETRY_INTERVAL)
});

/// Configures a consumer instance: where to connect, what to read and how to
/// recover. Built by the hosting collaborator; the core does not load
/// configuration itself.
#[derive(Debug, Builder, Clone)]
#[builder(build_fn(private, name = "build_impl"))]
pub struct ConsumerConfig {
    /// Broker addresses as `host:port`, tried in order.
    #[builder(default, setter(custom))]
    pub bootstrap: Vec<String>,
    /// Topic to subscribe to.
    #[builder(setter(into))]
    pub topic: TopicName,
    /// Consumer group this instance joins.
    #[builder(setter(into))]
    pub group: GroupId,
    /// Read position when the group has no committed offset.
    #[builder(default)]
    pub start_offset: StartOffset,
    /// Bounded wait for a single poll request.
    #[builder(default = "CONSUMER_POLL_TIMEOUT")]
    pub poll_timeout: Duration,
    /// Fixed delay before retrying after a transient error.
    #[builder(default = "*DEFAULT_RETRY_INTERVAL")]
    pub retry_interval: Duration,
}

impl ConsumerConfig {
    pub fn builder() -> ConsumerConfigBuilder {
        ConsumerConfigBuilder::default()
    }

    pub(crate) fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            bootstrap: self.bootstrap.clone(),
            group_id: Some(self.group.clone()),
            start_offset: self.start_offset,
        }
    }
}

impl ConsumerConfigBuilder {
    pub fn build(&self) -> Result<ConsumerConfig> {
        let config = self.build_impl().map_err(|e| {
            ClientError::Config(format!("missing required config option: {e}"))
        })?;

        if config.bootstrap.is_empty() {
            return Err(
                ClientError::Config("at least one bootstrap address is required".to_owned()).into(),
            );
        }
        if config.topic.is_empty() {
            return Err(ClientError::Config("topic may not be empty".to_owned()).into());
        }
        if config.group.is_empty() {
            return Err(ClientError::Config("consumer group may not be empty".to_owned()).into());
        }

        Ok(config)
    }

    pub fn bootstrap(&mut self, addr: impl Into<String>) -> &mut Self {
        self.bootstrap.get_or_insert_with(Vec::new).push(addr.into());
        self
    }
}
