//! Long-lived background task driven by a command channel and a tick interval.
//!
//! A [`BackgroundWorker`] owns one [`BackgroundRunnable`] on a spawned tokio
//! task. Commands submitted through the worker are handled in order; between
//! commands the runnable's `on_tick` fires every `tick_interval_ms`. Commands
//! queued before [`BackgroundWorker::stop`] still run before `shutdown`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const COMMAND_CAPACITY: usize = 64;

/// Handler owned by a [`BackgroundWorker`].
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    /// Handles one submitted command.
    async fn run(&mut self, task: Self::Task);

    /// Periodic work. No-op unless overridden.
    async fn on_tick(&mut self) {}

    /// Final hook once the loop exits.
    async fn shutdown(&mut self) {}
}

/// Handle to a running background task.
///
/// Dropping the handle closes the command channel, which also ends the loop.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns the loop on the current runtime.
    #[must_use]
    pub fn start(mut runnable: R, tick_interval_ms: u64) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(COMMAND_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(Duration::from_millis(tick_interval_ms.max(1)));
            // The first tick completes immediately.
            ticks.tick().await;

            loop {
                tokio::select! {
                    biased;
                    task = rx.recv() => match task {
                        Some(task) => runnable.run(task).await,
                        None => break,
                    },
                    _ = &mut shutdown_rx => break,
                    _ = ticks.tick() => runnable.on_tick().await,
                }
            }

            rx.close();
            while let Some(task) = rx.recv().await {
                runnable.run(task).await;
            }
            runnable.shutdown().await;
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Queues a command.
    ///
    /// # Errors
    ///
    /// Fails once the worker has stopped.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        let Some(tx) = &self.tx else {
            anyhow::bail!("worker not running");
        };
        tx.send(task)
            .await
            .map_err(|_| anyhow::anyhow!("worker channel closed"))
    }

    /// Queues a command without waiting for channel capacity.
    ///
    /// # Errors
    ///
    /// Fails once the worker has stopped or while the channel is full.
    pub fn try_submit(&self, task: R::Task) -> anyhow::Result<()> {
        let Some(tx) = &self.tx else {
            anyhow::bail!("worker not running");
        };
        tx.try_send(task)
            .map_err(|e| anyhow::anyhow!("worker channel unavailable: {e}"))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the loop to exit, runs the commands already queued, and waits
    /// for `shutdown` to run.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl<R: BackgroundRunnable> std::fmt::Debug for BackgroundWorker<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundWorker")
            .field("running", &self.is_running())
            .finish()
    }
}
