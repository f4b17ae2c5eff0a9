use tessera_db::types::{MessageRecord, ProofBuffers};
use tessera_primitives::{batch::BatchRecord, B256};

use crate::{
    define_table_with_default_codec, define_table_with_seek_key_codec, define_table_without_codec,
    impl_bincode_value_codec,
};

define_table_with_seek_key_codec!(
    /// Batch records by batch index
    (BatchSchema) u64 => BatchRecord
);

define_table_with_default_codec!(
    /// Batch index by batch hash
    (BatchHashIndexSchema) B256 => u64
);

define_table_with_default_codec!(
    /// Proof and instance buffers of verified batches
    (BatchProofSchema) B256 => ProofBuffers
);

define_table_with_default_codec!(
    /// Relay state of cross-layer messages by message hash
    (RelayMessageSchema) B256 => MessageRecord
);
