use std::time::Duration;

use crate::driver::DriverError;

/// Failure of a single `send` call, surfaced synchronously to the caller.
/// The producer never retries on its own; retry policy belongs to the caller.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("topic name may not be empty")]
    EmptyTopic,
    /// The broker refused the record. The reason is the broker-supplied text.
    #[error("broker rejected record: {reason}")]
    Rejected { reason: String },
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    /// The connection died during delivery. It is discarded and rebuilt on
    /// the next call.
    #[error("broker connection failed: {0}")]
    Connection(#[source] DriverError),
}
