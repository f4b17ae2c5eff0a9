use serde::{Deserialize, Serialize};
use tessera_primitives::{batch::MsgStatus, B256};

/// Relay state of a cross-layer message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub status: MsgStatus,
    pub layer1_hash: Option<B256>,
}

/// Proof artifacts of a verified batch, as the verifier contract takes them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBuffers {
    pub proof: Vec<u8>,
    pub instances: Vec<u8>,
}
