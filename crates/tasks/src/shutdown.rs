use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::Notify;

/// Process-wide shutdown trigger.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Sends the shutdown signal to every subscribed task.
    pub fn send(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_sent(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub(crate) async fn wait(&self) {
        loop {
            // register before checking the flag so a concurrent send is not missed
            let notified = self.notify.notified();
            if self.is_sent() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle given to a running task. Counts as a pending task until dropped.
#[derive(Debug)]
pub struct ShutdownGuard {
    signal: ShutdownSignal,
    pending: Arc<AtomicUsize>,
}

impl ShutdownGuard {
    pub(crate) fn new(signal: ShutdownSignal, pending: Arc<AtomicUsize>) -> Self {
        pending.fetch_add(1, Ordering::SeqCst);
        Self { signal, pending }
    }

    /// Check if shutdown signal has been sent
    pub fn should_shutdown(&self) -> bool {
        self.signal.is_sent()
    }

    /// Waits until shutdown signal is sent
    pub async fn wait_for_shutdown(&self) {
        self.signal.wait().await
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}
