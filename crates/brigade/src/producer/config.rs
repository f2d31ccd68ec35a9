use std::time::Duration;

use anyhow::Result;
use derive_builder::Builder;

use brigade_types::defaults::PRODUCER_DELIVERY_TIMEOUT;

use crate::config::BrokerConfig;
use crate::ClientError;

/// Configures a producer instance.
#[derive(Debug, Builder, Clone)]
#[builder(build_fn(private, name = "build_impl"))]
pub struct ProducerConfig {
    /// Broker addresses as `host:port`, tried in order.
    #[builder(default, setter(custom))]
    pub bootstrap: Vec<String>,
    /// How long to wait for broker acknowledgment before giving up.
    #[builder(default = "PRODUCER_DELIVERY_TIMEOUT")]
    pub delivery_timeout: Duration,
}

impl ProducerConfig {
    pub fn builder() -> ProducerConfigBuilder {
        ProducerConfigBuilder::default()
    }

    pub(crate) fn broker_config(&self) -> BrokerConfig {
        BrokerConfig::new(self.bootstrap.clone())
    }
}

impl ProducerConfigBuilder {
    pub fn build(&self) -> Result<ProducerConfig> {
        let config = self.build_impl().map_err(|e| {
            ClientError::Config(format!("missing required config option: {e}"))
        })?;

        if config.bootstrap.is_empty() {
            return Err(
                ClientError::Config("at least one bootstrap address is required".to_owned()).into(),
            );
        }

        Ok(config)
    }

    pub fn bootstrap(&mut self, addr: impl Into<String>) -> &mut Self {
        self.bootstrap.get_or_insert_with(Vec::new).push(addr.into());
        self
    }
}
