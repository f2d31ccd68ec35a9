//! The consumer: a group subscription driven by a background polling loop.
//!
//! One call to [`Consumer::start`] opens a broker connection, subscribes and
//! spawns a dedicated worker task running the loop: poll, validate, process,
//! commit. Transient broker errors are retried after a fixed backoff; a
//! released connection ends the loop immediately. Every suspension point
//! observes the stop signal, and whichever way the loop exits, the connection
//! is released exactly once before the state reaches [`RunState::Stopped`].

mod config;
mod session;
mod state;

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use brigade_types::event::StickyEvent;

use crate::driver::{BrokerClient, ConsumedMessage, ErrorClass};
use crate::error::Result;
use crate::metrics::ClientMetrics;

pub use config::{ConsumerConfig, ConsumerConfigBuilder};
pub use state::RunState;

use session::ConsumerSession;
use state::StateCell;

/// Caller-supplied processing step, invoked at most once per poll cycle per
/// message. A commit only follows an invocation that returned `Ok`.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, value: &[u8]) -> anyhow::Result<()>;
}

impl<F> MessageHandler for F
where
    F: Fn(&[u8]) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn handle(&self, value: &[u8]) -> anyhow::Result<()> {
        self(value)
    }
}

/// The default processing step: log each value.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

impl MessageHandler for LogHandler {
    fn handle(&self, value: &[u8]) -> anyhow::Result<()> {
        info!(value = %String::from_utf8_lossy(value), "received message");
        Ok(())
    }
}

/// Factory for consumer instances bound to one broker driver.
pub struct Consumer {
    client: Arc<dyn BrokerClient>,
}

impl Consumer {
    pub fn new(client: Arc<dyn BrokerClient>) -> Self {
        Self { client }
    }

    /// Subscribe and start the polling loop in the background.
    ///
    /// Connect and subscribe happen before anything is spawned: a failure
    /// here surfaces as [`ClientError::Startup`](crate::ClientError::Startup)
    /// and leaves no loop and no connection behind.
    #[instrument(
        skip(self, config, handler),
        fields(topic = %config.topic, group = %config.group),
    )]
    pub async fn start(
        &self,
        config: ConsumerConfig,
        handler: impl MessageHandler,
    ) -> Result<ConsumerHandle> {
        let session = ConsumerSession::open(self.client.as_ref(), &config).await?;

        let shutdown = StickyEvent::shared();
        let state = Arc::new(StateCell::new());
        let metrics = Arc::new(ClientMetrics::new());

        let worker = ConsumerWorker {
            session,
            config,
            handler: Box::new(handler),
            shutdown: shutdown.clone(),
            state: state.clone(),
            metrics: metrics.clone(),
        };
        let task = tokio::spawn(worker.run());

        Ok(ConsumerHandle {
            shutdown,
            state,
            metrics,
            task: Some(task),
        })
    }
}

/// Handle to a running consumer.
///
/// Dropping the handle requests shutdown as well, so an abandoned consumer
/// does not keep polling forever.
pub struct ConsumerHandle {
    shutdown: Arc<StickyEvent>,
    state: Arc<StateCell>,
    metrics: Arc<ClientMetrics>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl ConsumerHandle {
    /// Current lifecycle state of the loop.
    pub fn state(&self) -> RunState {
        self.state.get()
    }

    pub fn metrics(&self) -> Arc<ClientMetrics> {
        self.metrics.clone()
    }

    /// Request shutdown without waiting for it to complete.
    pub fn shutdown(&self) {
        self.shutdown.notify();
    }

    /// Request shutdown and wait until the loop has released its connection
    /// and reached [`RunState::Stopped`].
    pub async fn stop(mut self) {
        self.shutdown.notify();
        self.state.wait_for(RunState::Stopped).await;
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                error!(%error, "consumer worker task failed");
            }
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        debug!("notify consumer shutdown");
        self.shutdown.notify();
    }
}

enum Iteration {
    Continue,
    Break,
}

struct ConsumerWorker {
    session: ConsumerSession,
    config: ConsumerConfig,
    handler: Box<dyn MessageHandler>,
    shutdown: Arc<StickyEvent>,
    state: Arc<StateCell>,
    metrics: Arc<ClientMetrics>,
}

impl ConsumerWorker {
    #[instrument(
        name = "consume_loop",
        skip(self),
        fields(topic = %self.config.topic, group = %self.config.group),
    )]
    async fn run(mut self) {
        self.state.set(RunState::Running);
        info!("consumer loop running");

        loop {
            if self.shutdown.is_set() {
                debug!("stop requested");
                break;
            }

            let polled = tokio::select! {
                biased;
                _ = self.shutdown.listen() => {
                    debug!("stop requested during poll");
                    break;
                }
                polled = self.session.poll(self.config.poll_timeout) => polled,
            };

            let iteration = match polled {
                Ok(Some(message)) => self.process(message).await,
                // bounded wait elapsed without a record
                Ok(None) => Iteration::Continue,
                Err(error) => match error.classification() {
                    ErrorClass::Fatal => {
                        error!(
                            %error,
                            classification = %ErrorClass::Fatal,
                            "broker connection unusable, ending consume loop"
                        );
                        Iteration::Break
                    }
                    ErrorClass::Transient => {
                        warn!(
                            %error,
                            classification = %ErrorClass::Transient,
                            "transient consume error"
                        );
                        self.backoff().await;
                        Iteration::Continue
                    }
                },
            };

            if matches!(iteration, Iteration::Break) {
                break;
            }
        }

        self.state.set(RunState::Stopping);
        self.session.release().await;
        self.state.set(RunState::Stopped);
        info!("consumer stopped");
    }

    /// Validate, process and commit one message.
    async fn process(&mut self, message: ConsumedMessage) -> Iteration {
        let partition = message.partition();
        let offset = message.offset();

        let Some(value) = message.value() else {
            warn!(partition, offset, "skipping frame without a value");
            self.metrics.consumer().add_skipped(1);
            return Iteration::Continue;
        };

        debug!(partition, offset, size = value.len(), "polled message");
        self.metrics.consumer().add_records(1);
        self.metrics.consumer().add_bytes(value.len() as u64);

        if let Err(error) = self.handler.handle(value) {
            warn!(
                %error,
                partition,
                offset,
                classification = %ErrorClass::Transient,
                "handler failed, message left uncommitted for redelivery"
            );
            self.backoff().await;
            return Iteration::Continue;
        }

        // Deliberately not raced against the stop signal: a message that was
        // processed gets its commit, cancellation is observed at the top of
        // the next iteration.
        match self.session.commit(&message).await {
            Ok(()) => {
                self.metrics.consumer().add_committed(1);
                Iteration::Continue
            }
            Err(error) => match error.classification() {
                ErrorClass::Fatal => {
                    error!(
                        %error,
                        partition,
                        offset,
                        classification = %ErrorClass::Fatal,
                        "commit failed on an unusable connection, ending consume loop"
                    );
                    Iteration::Break
                }
                ErrorClass::Transient => {
                    warn!(
                        %error,
                        partition,
                        offset,
                        classification = %ErrorClass::Transient,
                        "commit failed, offset not recorded"
                    );
                    self.backoff().await;
                    Iteration::Continue
                }
            },
        }
    }

    /// Fixed-interval delay before the next attempt. A stop request arriving
    /// mid-delay shortens the wait instead of forcing the full interval.
    async fn backoff(&mut self) {
        let delay = self.config.retry_interval;
        info!(?delay, "entering backoff before retry");
        tokio::select! {
            biased;
            _ = self.shutdown.listen() => debug!("backoff cut short by stop request"),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
