//! UI-facing client: spawns the bus worker thread and queues commands for it.

use std::thread::JoinHandle;

use crate::command::{self, Command, CommandSender, QueueClosed};
use crate::config::{ClientConfig, ConfigError};
use crate::outcome::{self, OutcomeReceiver};
use crate::session::BusHandler;
use crate::transport::Transport;

/// Name of the worker thread; every transport call happens on it.
pub const WORKER_THREAD_NAME: &str = "bus-handler";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn bus handler thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("client is disconnected")]
    Closed,
    #[error("bus handler thread panicked")]
    WorkerPanicked,
}

impl From<QueueClosed> for ClientError {
    fn from(_: QueueClosed) -> Self {
        ClientError::Closed
    }
}

/// Handle held by the UI. Calls never block; results arrive on the `OutcomeReceiver`.
///
/// Dropping the client queues `Disconnect` if the worker is still running.
pub struct Client {
    commands: CommandSender,
    worker: Option<JoinHandle<()>>,
}

impl Client {
    /// Start the worker for `transport`. Nothing touches the bus until `connect`.
    pub fn spawn<T: Transport>(
        transport: T,
        config: ClientConfig,
    ) -> Result<(Self, OutcomeReceiver), ClientError> {
        config.validate()?;
        let (commands, queue) = command::channel();
        let (notifier, outcomes) = outcome::channel();
        let handler = BusHandler::new(transport, config, commands.clone(), notifier);
        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || handler.run(queue))
            .map_err(ClientError::Spawn)?;
        Ok((
            Self {
                commands,
                worker: Some(worker),
            },
            outcomes,
        ))
    }

    /// Start discovering groups; the first one found is joined.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.send(Command::Connect)
    }

    /// Call the remote method. Dropped silently by the worker if no group is joined.
    pub fn ping(&self, argument: impl Into<String>) -> Result<(), ClientError> {
        self.send(Command::Call(argument.into()))
    }

    /// Tear down the session. Commands queued after this are never processed.
    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Disconnect)
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        Ok(self.commands.send(command)?)
    }

    /// Queue `Disconnect` (if not already done) and wait for the worker to exit.
    /// Commands queued earlier still run first.
    pub fn join(mut self) -> Result<(), ClientError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // Fails harmlessly when the worker already stopped.
        let _ = self.commands.send(Command::Disconnect);
        worker.join().map_err(|_| ClientError::WorkerPanicked)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.commands.send(Command::Disconnect);
        }
    }
}
