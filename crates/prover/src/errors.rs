use tessera_db::DbError;
use tessera_primitives::{proof::SigningError, task::TaskDecodeError, B256};
use thiserror::Error;

/// Failure of one iteration of the proving loop.
#[derive(Debug, Error)]
pub enum ProverError {
    #[error("task queue: {0}")]
    Queue(#[from] DbError),

    #[error("fetch task: {0}")]
    Fetch(#[from] FetchTaskError),

    #[error("sign proof: {0}")]
    Signing(#[from] SigningError),

    #[error("submit proof: {0}")]
    Submit(#[from] SubmitError),
}

#[derive(Debug, Error)]
pub enum FetchTaskError {
    #[error("latest safe block: {0}")]
    SafeHeight(#[source] ChainError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("no tasks available")]
    NoTaskAvailable,

    #[error(transparent)]
    Decode(#[from] TaskDecodeError),
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc: {0}")]
    Rpc(#[from] jsonrpsee::core::ClientError),

    #[error("node has no {0} block")]
    MissingBlock(&'static str),
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("coordinator returned errcode {errcode}: {errmsg}")]
    Rejected { errcode: i32, errmsg: String },

    #[error("not logged in")]
    NotLoggedIn,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("encode proof payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] CoordinatorError),

    #[error("submit proof error, errcode {errcode}: {errmsg}")]
    Rejected { errcode: i32, errmsg: String },
}

/// Why a task attempt produced a `ProofError` detail.
#[derive(Debug, Error)]
pub(crate) enum ProvingError {
    #[error("chunk task has no blocks")]
    EmptyChunk,

    #[error("get trace of block {hash} failed: {source}")]
    Trace {
        hash: B256,
        #[source]
        source: ChainError,
    },

    #[error("{0}")]
    Engine(anyhow::Error),
}
