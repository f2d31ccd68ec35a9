use std::fmt;
use std::str::FromStr;

use brigade_types::GroupId;

use crate::ClientError;

/// Connect-time view of the broker endpoints and group membership.
///
/// Built from [`ConsumerConfig`](crate::ConsumerConfig) or
/// [`ProducerConfig`](crate::ProducerConfig) when a connection is opened and
/// immutable from then on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker addresses as `host:port`, tried in order.
    pub bootstrap: Vec<String>,
    /// Consumer group membership; `None` for producer connections.
    pub group_id: Option<GroupId>,
    /// Where to begin reading when the group has no committed offset.
    pub start_offset: StartOffset,
}

impl BrokerConfig {
    pub fn new(bootstrap: Vec<String>) -> Self {
        Self {
            bootstrap,
            group_id: None,
            start_offset: StartOffset::default(),
        }
    }

    pub fn with_group(mut self, group_id: impl Into<GroupId>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_start_offset(mut self, start_offset: StartOffset) -> Self {
        self.start_offset = start_offset;
        self
    }
}

/// Initial read position for a group without committed offsets.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum StartOffset {
    /// Read from the beginning of each partition.
    #[default]
    Earliest,
    /// Read only records appended after subscription.
    Latest,
}

impl fmt::Display for StartOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOffset::Earliest => write!(f, "earliest"),
            StartOffset::Latest => write!(f, "latest"),
        }
    }
}

impl FromStr for StartOffset {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earliest" => Ok(StartOffset::Earliest),
            "latest" => Ok(StartOffset::Latest),
            _ => Err(ClientError::Config(format!(
                "invalid start offset policy: {s}"
            ))),
        }
    }
}
