use rockbound::CodecError;
use tessera_primitives::{batch::StatusError, B256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The single-slot task queue already holds a different task.
    #[error("task queue already holds task {0}")]
    QueueOccupied(String),

    #[error("no batch with hash {0}")]
    BatchNotFound(B256),

    #[error("batch {0} already exists")]
    BatchExists(B256),

    #[error("batch {hash}: {source}")]
    InvalidStatus {
        hash: B256,
        #[source]
        source: StatusError,
    },

    #[error("database handle is closed")]
    Closed,

    #[error("transaction error: {0}")]
    TransactionError(String),

    #[error("codec: {0}")]
    CodecError(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for DbError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}

impl From<CodecError> for DbError {
    fn from(value: CodecError) -> Self {
        Self::CodecError(value.to_string())
    }
}
