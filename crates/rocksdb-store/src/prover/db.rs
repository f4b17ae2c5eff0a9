use std::sync::Arc;

use parking_lot::RwLock;
use rockbound::{
    utils::get_last, OptimisticTransactionDB, SchemaDBOperationsExt, TransactionRetry,
};
use tessera_db::{errors::DbError, traits::ProverTaskQueue, DbResult};
use tessera_primitives::task::ProvingTask;
use tracing::*;

use super::schemas::ProverTaskSchema;
use crate::DbOpsConfig;

/// Durable single-slot task queue.
///
/// Closing releases this queue's reference to the database; RocksDB shuts down
/// once the last reference is gone.
pub struct ProverTaskDb {
    db: RwLock<Option<Arc<OptimisticTransactionDB>>>,
    ops: DbOpsConfig,
}

impl ProverTaskDb {
    pub fn new(db: Arc<OptimisticTransactionDB>, ops: DbOpsConfig) -> Self {
        Self {
            db: RwLock::new(Some(db)),
            ops,
        }
    }

    fn handle(&self) -> DbResult<Arc<OptimisticTransactionDB>> {
        self.db.read().clone().ok_or(DbError::Closed)
    }
}

impl ProverTaskQueue for ProverTaskDb {
    fn peek_task(&self) -> DbResult<Option<ProvingTask>> {
        let db = self.handle()?;
        Ok(get_last::<ProverTaskSchema>(db.as_ref())?.map(|(_, task)| task))
    }

    fn update_retry_count(&self, task: &ProvingTask, retry_count: u32) -> DbResult<()> {
        let db = self.handle()?;
        db.with_optimistic_txn(TransactionRetry::Count(self.ops.retry_count), |txn| {
            if let Some((resident, _)) = get_last::<ProverTaskSchema>(txn)? {
                if resident != task.id {
                    return Err(DbError::QueueOccupied(resident));
                }
            }

            let mut updated = task.clone();
            updated.retry_count = retry_count;
            txn.put::<ProverTaskSchema>(&task.id, &updated)?;

            Ok::<(), DbError>(())
        })
        .map_err(|e: rockbound::TransactionError<_>| DbError::TransactionError(e.to_string()))
    }

    fn delete_task(&self, task_id: &str) -> DbResult<()> {
        let db = self.handle()?;
        let key = task_id.to_owned();
        db.with_optimistic_txn(TransactionRetry::Count(self.ops.retry_count), |txn| {
            txn.delete::<ProverTaskSchema>(&key)?;
            Ok::<(), DbError>(())
        })
        .map_err(|e: rockbound::TransactionError<_>| DbError::TransactionError(e.to_string()))
    }

    fn close(&self) -> DbResult<()> {
        if self.db.write().take().is_some() {
            debug!("prover task queue closed");
        }
        Ok(())
    }
}
