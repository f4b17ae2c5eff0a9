//! Calldata for the rollup and gas price oracle contracts.

use alloy_primitives::{Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};

use crate::batch::BatchHeader;

sol! {
    struct CommitBatch {
        uint64 batchIndex;
        bytes32 parentBatchHash;
        bytes32 prevStateRoot;
        bytes32 postStateRoot;
        bytes32 withdrawRoot;
        bytes32 dataHash;
    }

    function commitBatches(CommitBatch[] batches);

    function finalizeBatchWithProof(bytes32 batchHash, uint256[] proof, uint256[] instances);

    function setL2BaseFee(uint256 newL2BaseFee);
}

impl From<&BatchHeader> for CommitBatch {
    fn from(header: &BatchHeader) -> Self {
        Self {
            batchIndex: header.index,
            parentBatchHash: header.parent_batch_hash,
            prevStateRoot: header.prev_state_root,
            postStateRoot: header.post_state_root,
            withdrawRoot: header.withdraw_root,
            dataHash: header.data_hash,
        }
    }
}

pub fn encode_commit_batches<'a>(headers: impl IntoIterator<Item = &'a BatchHeader>) -> Bytes {
    let batches = headers.into_iter().map(CommitBatch::from).collect();
    commitBatchesCall { batches }.abi_encode().into()
}

pub fn encode_finalize_batch(
    batch_hash: B256,
    proof: Vec<U256>,
    instances: Vec<U256>,
) -> Bytes {
    finalizeBatchWithProofCall {
        batchHash: batch_hash,
        proof,
        instances,
    }
    .abi_encode()
    .into()
}

pub fn encode_set_l2_base_fee(fee: u128) -> Bytes {
    setL2BaseFeeCall {
        newL2BaseFee: U256::from(fee),
    }
    .abi_encode()
    .into()
}
