use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tessera_primitives::task::ProvingTask;

use crate::{errors::DbError, traits::ProverTaskQueue, DbResult};

/// Single-slot queue kept in memory.
#[derive(Debug, Default)]
pub struct StubTaskQueue {
    slot: Mutex<Option<ProvingTask>>,
    closed: AtomicBool,
}

impl StubTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the queue as if a previous run crashed while holding `task`.
    pub fn with_task(task: ProvingTask) -> Self {
        Self {
            slot: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        }
    }

    /// Slot contents, readable even after the queue was closed.
    pub fn resident_task(&self) -> Option<ProvingTask> {
        self.slot.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        Ok(())
    }
}

impl ProverTaskQueue for StubTaskQueue {
    fn peek_task(&self) -> DbResult<Option<ProvingTask>> {
        self.ensure_open()?;
        Ok(self.slot.lock().clone())
    }

    fn update_retry_count(&self, task: &ProvingTask, retry_count: u32) -> DbResult<()> {
        self.ensure_open()?;
        let mut slot = self.slot.lock();
        if let Some(resident) = slot.as_ref() {
            if resident.id != task.id {
                return Err(DbError::QueueOccupied(resident.id.clone()));
            }
        }

        let mut updated = task.clone();
        updated.retry_count = retry_count;
        *slot = Some(updated);
        Ok(())
    }

    fn delete_task(&self, task_id: &str) -> DbResult<()> {
        self.ensure_open()?;
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|t| t.id == task_id) {
            *slot = None;
        }
        Ok(())
    }

    fn close(&self) -> DbResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}
