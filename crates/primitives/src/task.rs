use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proof::{ChunkInfo, ChunkProof, ProofType};

/// Blocks making up one chunk, in the order the coordinator listed them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkTaskDetail {
    pub block_hashes: Vec<B256>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTaskDetail {
    pub chunk_infos: Vec<ChunkInfo>,
    pub chunk_proofs: Vec<ChunkProof>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskDetail {
    Chunk(ChunkTaskDetail),
    Batch(BatchTaskDetail),
}

impl TaskDetail {
    pub fn proof_type(&self) -> ProofType {
        match self {
            TaskDetail::Chunk(_) => ProofType::Chunk,
            TaskDetail::Batch(_) => ProofType::Batch,
        }
    }
}

/// Unit of proving work held by the agent's queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvingTask {
    pub id: String,
    pub detail: TaskDetail,
    /// Number of attempts started on this task, persisted before each attempt.
    pub retry_count: u32,
}

impl ProvingTask {
    pub fn new(id: impl Into<String>, detail: TaskDetail) -> Self {
        Self {
            id: id.into(),
            detail,
            retry_count: 0,
        }
    }

    pub fn proof_type(&self) -> ProofType {
        self.detail.proof_type()
    }
}

#[derive(Debug, Error)]
pub enum TaskDecodeError {
    #[error("unknown proof type {0}")]
    UnknownProofType(u8),

    #[error("malformed {0} payload: {1}")]
    Malformed(ProofType, #[source] serde_json::Error),
}

/// Decodes the opaque payload the coordinator hands out.
///
/// A chunk payload is a JSON list of block hashes. A batch payload is a JSON
/// list of chunk proofs; the chunk infos are taken from the proofs that carry
/// one.
pub fn decode_task_payload(raw_type: u8, payload: &str) -> Result<TaskDetail, TaskDecodeError> {
    let proof_type =
        ProofType::try_from(raw_type).map_err(|_| TaskDecodeError::UnknownProofType(raw_type))?;

    match proof_type {
        ProofType::Chunk => {
            let block_hashes: Vec<B256> = serde_json::from_str(payload)
                .map_err(|e| TaskDecodeError::Malformed(proof_type, e))?;
            Ok(TaskDetail::Chunk(ChunkTaskDetail { block_hashes }))
        }
        ProofType::Batch => {
            let chunk_proofs: Vec<ChunkProof> = serde_json::from_str(payload)
                .map_err(|e| TaskDecodeError::Malformed(proof_type, e))?;
            let chunk_infos = chunk_proofs
                .iter()
                .filter_map(|p| p.chunk_info.clone())
                .collect();
            Ok(TaskDetail::Batch(BatchTaskDetail {
                chunk_infos,
                chunk_proofs,
            }))
        }
    }
}
