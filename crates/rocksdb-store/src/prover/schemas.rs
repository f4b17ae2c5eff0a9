use tessera_primitives::task::ProvingTask;

use crate::{define_table_with_default_codec, define_table_without_codec, impl_bincode_value_codec};

define_table_with_default_codec!(
    /// Slot holding the task the agent is working on, keyed by task id
    (ProverTaskSchema) String => ProvingTask
);
