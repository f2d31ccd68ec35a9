use std::time::Duration;

use crate::PartitionCount;

/// Bounded wait used for a single consumer poll request.
pub const CONSUMER_POLL_TIMEOUT: Duration = Duration::from_millis(500);

/// Fixed delay before retrying after a transient consume error.
pub const CONSUMER_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// How long a producer waits for broker acknowledgment before giving up.
pub const PRODUCER_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Partitions assigned to topics that are auto-created by a driver.
pub const TOPIC_PARTITION_COUNT: PartitionCount = 1;
