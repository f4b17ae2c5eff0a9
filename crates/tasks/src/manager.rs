use std::{
    any::Any,
    fmt::{Display, Formatter},
    future::Future,
    panic,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use futures_util::FutureExt;
use tokio::{runtime::Handle, sync::mpsc};
use tracing::*;

use crate::shutdown::{ShutdownGuard, ShutdownSignal};

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Error with the name of the task that panicked and the panic payload, if it
/// was a string.
#[derive(Debug, thiserror::Error)]
pub struct PanickedTaskError {
    task_name: String,
    error: Option<String>,
}

impl Display for PanickedTaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let task_name = &self.task_name;
        match &self.error {
            Some(error) => write!(f, "critical task `{task_name}` panicked: `{error}`"),
            None => write!(f, "critical task `{task_name}` panicked"),
        }
    }
}

impl PanickedTaskError {
    fn new(task_name: &str, payload: Box<dyn Any + Send>) -> Self {
        let error = match payload.downcast::<String>() {
            Ok(value) => Some(*value),
            Err(payload) => payload.downcast::<&str>().ok().map(|v| v.to_string()),
        };

        Self {
            task_name: task_name.to_string(),
            error,
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }
}

pub struct TaskManager {
    tokio_handle: Handle,
    panicked_tasks_tx: mpsc::UnboundedSender<PanickedTaskError>,
    panicked_tasks_rx: mpsc::UnboundedReceiver<PanickedTaskError>,
    shutdown_signal: ShutdownSignal,
    pending_tasks: Arc<AtomicUsize>,
}

impl TaskManager {
    pub fn new(tokio_handle: Handle) -> Self {
        let (panicked_tasks_tx, panicked_tasks_rx) = mpsc::unbounded_channel();

        Self {
            tokio_handle,
            panicked_tasks_tx,
            panicked_tasks_rx,
            shutdown_signal: ShutdownSignal::new(),
            pending_tasks: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            tokio_handle: self.tokio_handle.clone(),
            panicked_tasks_tx: self.panicked_tasks_tx.clone(),
            shutdown_signal: self.shutdown_signal.clone(),
            pending_tasks: self.pending_tasks.clone(),
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_signal.clone()
    }

    /// Sends shutdown on SIGINT or SIGTERM.
    pub fn start_signal_listeners(&self) {
        let shutdown_signal = self.shutdown_signal();

        self.tokio_handle.spawn(async move {
            wait_for_termination().await;
            warn!("got termination signal, initiating shutdown");
            shutdown_signal.send();
        });
    }

    /// Blocks until a critical task panics or shutdown is requested, then
    /// waits up to `shutdown_timeout` for the remaining tasks to drop their
    /// guards.
    pub fn monitor(mut self, shutdown_timeout: Option<Duration>) -> Result<(), PanickedTaskError> {
        let signal = self.shutdown_signal.clone();
        let res = self.tokio_handle.clone().block_on(async {
            tokio::select! {
                msg = self.panicked_tasks_rx.recv() => match msg {
                    Some(error) => Err(error),
                    None => Ok(()),
                },
                _ = signal.wait() => Ok(()),
            }
        });

        self.shutdown_signal.send();
        if !self.wait_for_pending_tasks(shutdown_timeout) {
            info!("shutdown timeout expired, forcing shutdown");
        }

        res
    }

    fn wait_for_pending_tasks(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        while self.pending_tasks.load(Ordering::SeqCst) > 0 {
            if deadline.is_some_and(|d| Instant::now() > d) {
                return false;
            }
            std::thread::sleep(SHUTDOWN_POLL_INTERVAL);
        }

        debug!("all tasks shut down");
        true
    }
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!(err = %e, "cannot listen for SIGTERM, only handling ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Spawns critical tasks on the manager's runtime.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    tokio_handle: Handle,
    panicked_tasks_tx: mpsc::UnboundedSender<PanickedTaskError>,
    shutdown_signal: ShutdownSignal,
    pending_tasks: Arc<AtomicUsize>,
}

impl TaskExecutor {
    /// Spawns a task that is handed a [`ShutdownGuard`] and is expected to
    /// return on its own once shutdown is signalled.
    pub fn spawn_critical_async_with_shutdown<F, Fut>(
        &self,
        name: &'static str,
        async_func: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(ShutdownGuard) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let guard = ShutdownGuard::new(self.shutdown_signal.clone(), self.pending_tasks.clone());
        let fut = async_func(guard);
        self.spawn_catching(name, fut)
    }

    /// Spawns a task that is dropped when shutdown is signalled.
    pub fn spawn_critical_async(
        &self,
        name: &'static str,
        fut: impl Future<Output = ()> + Send + 'static,
    ) -> tokio::task::JoinHandle<()> {
        let guard = ShutdownGuard::new(self.shutdown_signal.clone(), self.pending_tasks.clone());
        let fut = async move {
            tokio::select! {
                _ = fut => {}
                _ = guard.wait_for_shutdown() => {
                    debug!(%name, "task cancelled by shutdown");
                }
            }
        };
        self.spawn_catching(name, fut)
    }

    fn spawn_catching(
        &self,
        name: &'static str,
        fut: impl Future<Output = ()> + Send + 'static,
    ) -> tokio::task::JoinHandle<()> {
        let panicked_tasks_tx = self.panicked_tasks_tx.clone();
        let task = panic::AssertUnwindSafe(fut).catch_unwind().map(move |res| {
            if let Err(payload) = res {
                let task_error = PanickedTaskError::new(name, payload);
                error!("{task_error}");
                let _ = panicked_tasks_tx.send(task_error);
            }
        });

        self.tokio_handle.spawn(task)
    }
}
