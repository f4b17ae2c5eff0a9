use alloy_primitives::{B256, U64};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Execution trace of one L2 block as returned by the chain endpoint.
///
/// Only the header fields the agent orders by are typed; the rest is passed to
/// the proof engine untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockTrace {
    pub header: TraceHeader,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceHeader {
    pub number: U64,
    pub hash: B256,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockTrace {
    pub fn height(&self) -> u64 {
        self.header.number.to::<u64>()
    }

    pub fn hash(&self) -> B256 {
        self.header.hash
    }
}

/// Sorts traces by block height, lowest first.
pub fn sort_by_height(traces: &mut [BlockTrace]) {
    traces.sort_by_key(BlockTrace::height);
}
