use crate::driver::DriverError;
use crate::producer::DeliveryError;

pub type Result<T, E = ClientError> = core::result::Result<T, E>;

/// Possible errors that may arise when using Brigade
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// Connect or subscribe failed before the consume loop existed.
    /// The consumer never left `Idle`.
    #[error("consumer startup failed: {0}")]
    Startup(#[source] DriverError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("invalid configuration: {0}")]
    Config(String),
}
