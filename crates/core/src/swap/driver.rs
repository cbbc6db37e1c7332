//! Runs a [`SwapController`] on one designated thread.
//!
//! Every operation is a command on a single-consumer queue drained by
//! [`SwapDriver::run`]. Scheduled removals sleep on their own task and then
//! post the ticket back into the same queue, so the controller is only ever
//! touched from the thread running the driver.

use std::io;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{
    swap::{RemovalTicket, SwapController, SwapError, SwapSnapshot},
    time::Timestamp,
};

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Show(Reply<Result<(), SwapError>>),
    Hide(Reply<Result<(), SwapError>>),
    SetTimestamp(Timestamp, Reply<Result<(), SwapError>>),
    Snapshot(Reply<SwapSnapshot>),
    RemovalDue(RemovalTicket),
}

pub struct SwapDriver {
    controller: SwapController,
    commands: mpsc::UnboundedReceiver<Command>,
    timers: mpsc::WeakUnboundedSender<Command>,
}

impl SwapDriver {
    pub fn new(controller: SwapController) -> (Self, SwapHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let driver = Self {
            controller,
            commands,
            timers: sender.downgrade(),
        };

        (driver, SwapHandle { commands: sender })
    }

    /// Spawns a thread with its own single-threaded runtime and runs the
    /// driver there until every handle has been dropped.
    pub fn start(controller: SwapController) -> io::Result<SwapHandle> {
        let (driver, handle) = Self::new(controller);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        thread::Builder::new()
            .name("tile-swap".to_owned())
            .spawn(move || runtime.block_on(driver.run()))?;

        Ok(handle)
    }

    /// Must be polled by a current-thread runtime (or `LocalSet`); the
    /// controller panics if it migrates between threads.
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }

        if self.controller.is_visible() {
            debug!("all swap handles dropped, removing overlays");
            let _ = self.controller.hide();
        }
        debug!("swap driver stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Show(reply) => {
                let _ = reply.send(self.controller.show());
            }
            Command::Hide(reply) => {
                let _ = reply.send(self.controller.hide());
            }
            Command::SetTimestamp(timestamp, reply) => {
                let result = self.controller.set_timestamp(timestamp);
                let _ = reply.send(result.map(|ticket| {
                    if let Some(ticket) = ticket {
                        self.schedule(ticket);
                    }
                }));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot());
            }
            Command::RemovalDue(ticket) => {
                let completion = self.controller.complete_swap(ticket);
                for warning in &completion.warnings {
                    warn!(%warning, swap = ?ticket.swap(), "tile swap finished with a surface failure");
                }
                if let Some(next) = completion.next {
                    self.schedule(next);
                }
            }
        }
    }

    fn schedule(&self, ticket: RemovalTicket) {
        let timers = self.timers.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ticket.delay()).await;
            if let Some(commands) = timers.upgrade() {
                let _ = commands.send(Command::RemovalDue(ticket));
            }
        });
    }
}

/// Cloneable, thread-safe access to a running [`SwapDriver`].
///
/// Each call resolves once the driver has applied it, so after
/// `set_timestamp(t).await` the tile provider already renders `t`. The
/// `*_blocking` variants are for threads without a runtime and panic if
/// called from inside one.
#[derive(Clone, Debug)]
pub struct SwapHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SwapHandle {
    pub async fn show(&self) -> Result<(), SwapError> {
        self.request(Command::Show).await?
    }

    pub async fn hide(&self) -> Result<(), SwapError> {
        self.request(Command::Hide).await?
    }

    pub async fn set_timestamp(&self, timestamp: impl Into<Timestamp>) -> Result<(), SwapError> {
        let timestamp = timestamp.into();
        self.request(|reply| Command::SetTimestamp(timestamp, reply))
            .await?
    }

    pub async fn snapshot(&self) -> Result<SwapSnapshot, SwapError> {
        self.request(Command::Snapshot).await
    }

    pub fn show_blocking(&self) -> Result<(), SwapError> {
        self.request_blocking(Command::Show)?
    }

    pub fn hide_blocking(&self) -> Result<(), SwapError> {
        self.request_blocking(Command::Hide)?
    }

    pub fn set_timestamp_blocking(&self, timestamp: impl Into<Timestamp>) -> Result<(), SwapError> {
        let timestamp = timestamp.into();
        self.request_blocking(|reply| Command::SetTimestamp(timestamp, reply))?
    }

    pub fn snapshot_blocking(&self) -> Result<SwapSnapshot, SwapError> {
        self.request_blocking(Command::Snapshot)
    }

    fn send<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<oneshot::Receiver<T>, SwapError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| SwapError::DriverStopped)?;
        Ok(response)
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SwapError> {
        self.send(command)?
            .await
            .map_err(|_| SwapError::DriverStopped)
    }

    fn request_blocking<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SwapError> {
        self.send(command)?
            .blocking_recv()
            .map_err(|_| SwapError::DriverStopped)
    }
}
