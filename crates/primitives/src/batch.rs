use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Proving progress of a batch. Written by the proving subsystem, only read by
/// the relayer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvingStatus {
    Unassigned,
    Assigned,
    Proved,
    Verified,
    Failed,
    Skipped,
}

/// On-chain progress of a batch.
///
/// ## State Transitions
///
/// - `Pending` -> `Committing` -> `Committed` | `CommitFailed`
/// - `Committed` -> `Finalizing` -> `Finalized` | `FinalizeFailed`
/// - `Committed` -> `FinalizationSkipped`
///
/// A confirmation may be reconciled before the in-flight status was written,
/// so `Pending` may jump straight to the commit outcome and `Committed` to the
/// finalize outcome. Writing the current status again is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollupStatus {
    Pending,
    Committing,
    Committed,
    CommitFailed,
    Finalizing,
    Finalized,
    FinalizeFailed,
    FinalizationSkipped,
}

impl RollupStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RollupStatus::CommitFailed
                | RollupStatus::Finalized
                | RollupStatus::FinalizeFailed
                | RollupStatus::FinalizationSkipped
        )
    }

    /// Attempts to move to `target`, leaving `self` untouched on failure.
    pub fn transition(&mut self, target: RollupStatus) -> Result<(), StatusError> {
        use RollupStatus::*;

        let is_valid = match (*self, target) {
            (from, to) if from == to => true,

            (Pending, Committing | Committed | CommitFailed) => true,
            (Committing, Committed | CommitFailed) => true,
            (Committed, Finalizing | Finalized | FinalizeFailed | FinalizationSkipped) => true,
            (Finalizing, Finalized | FinalizeFailed) => true,

            _ => false,
        };

        if is_valid {
            *self = target;
            Ok(())
        } else {
            Err(StatusError::InvalidRollupTransition(*self, target))
        }
    }
}

/// Progress of the gas oracle update anchored on a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasOracleStatus {
    Pending,
    Importing,
    Imported,
    Failed,
}

impl GasOracleStatus {
    pub fn transition(&mut self, target: GasOracleStatus) -> Result<(), StatusError> {
        use GasOracleStatus::*;

        let is_valid = match (*self, target) {
            (from, to) if from == to => true,
            (Pending, Importing | Imported | Failed) => true,
            (Importing, Imported | Failed) => true,
            _ => false,
        };

        if is_valid {
            *self = target;
            Ok(())
        } else {
            Err(StatusError::InvalidGasOracleTransition(*self, target))
        }
    }
}

/// Status of a relayed cross-layer message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgStatus {
    Pending,
    Submitted,
    Confirmed,
    RelayFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("invalid rollup status transition {0:?} -> {1:?}")]
    InvalidRollupTransition(RollupStatus, RollupStatus),

    #[error("invalid gas oracle status transition {0:?} -> {1:?}")]
    InvalidGasOracleTransition(GasOracleStatus, GasOracleStatus),
}

/// Commitment data of a batch as submitted in `commitBatches`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchHeader {
    pub index: u64,
    pub parent_batch_hash: B256,
    pub prev_state_root: B256,
    pub post_state_root: B256,
    pub withdraw_root: B256,
    pub data_hash: B256,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub hash: B256,
    pub header: BatchHeader,
    pub proving_status: ProvingStatus,
    pub rollup_status: RollupStatus,
    pub gas_oracle_status: GasOracleStatus,
    pub commit_tx_hash: Option<B256>,
    pub finalize_tx_hash: Option<B256>,
    pub oracle_tx_hash: Option<B256>,
    /// Unix seconds.
    pub created_at: u64,
}

impl BatchRecord {
    /// Creates a freshly proposed batch.
    pub fn new(hash: B256, header: BatchHeader, created_at: u64) -> Self {
        Self {
            hash,
            header,
            proving_status: ProvingStatus::Unassigned,
            rollup_status: RollupStatus::Pending,
            gas_oracle_status: GasOracleStatus::Pending,
            commit_tx_hash: None,
            finalize_tx_hash: None,
            oracle_tx_hash: None,
            created_at,
        }
    }

    pub fn index(&self) -> u64 {
        self.header.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLLUP: [RollupStatus; 8] = [
        RollupStatus::Pending,
        RollupStatus::Committing,
        RollupStatus::Committed,
        RollupStatus::CommitFailed,
        RollupStatus::Finalizing,
        RollupStatus::Finalized,
        RollupStatus::FinalizeFailed,
        RollupStatus::FinalizationSkipped,
    ];

    #[test]
    fn test_happy_path() {
        let mut status = RollupStatus::Pending;
        for next in [
            RollupStatus::Committing,
            RollupStatus::Committed,
            RollupStatus::Finalizing,
            RollupStatus::Finalized,
        ] {
            status.transition(next).unwrap();
            assert_eq!(status, next);
        }
    }

    #[test]
    fn test_terminal_status_never_left() {
        for from in ALL_ROLLUP.into_iter().filter(RollupStatus::is_terminal) {
            for to in ALL_ROLLUP.into_iter().filter(|to| *to != from) {
                let mut status = from;
                assert!(
                    status.transition(to).is_err(),
                    "{from:?} -> {to:?} should be rejected"
                );
                assert_eq!(status, from);
            }
        }
    }

    #[test]
    fn test_same_status_is_noop() {
        for s in ALL_ROLLUP {
            let mut status = s;
            assert!(status.transition(s).is_ok());
            assert_eq!(status, s);
        }
    }

    #[test]
    fn test_no_backwards_moves() {
        let invalid = [
            (RollupStatus::Committed, RollupStatus::Committing),
            (RollupStatus::Finalizing, RollupStatus::Committed),
            (RollupStatus::Finalizing, RollupStatus::FinalizationSkipped),
            (RollupStatus::Committing, RollupStatus::Finalizing),
            (RollupStatus::Pending, RollupStatus::Finalizing),
        ];

        for (from, to) in invalid {
            let mut status = from;
            let res = status.transition(to);
            assert_eq!(res, Err(StatusError::InvalidRollupTransition(from, to)));
        }
    }

    #[test]
    fn test_confirmation_racing_in_flight_write() {
        let mut status = RollupStatus::Pending;
        status.transition(RollupStatus::Committed).unwrap();
        // the late in-flight write must not pull the batch back
        assert!(status.transition(RollupStatus::Committing).is_err());
        assert_eq!(status, RollupStatus::Committed);
    }

    #[test]
    fn test_gas_oracle_transitions() {
        let mut status = GasOracleStatus::Pending;
        status.transition(GasOracleStatus::Importing).unwrap();
        status.transition(GasOracleStatus::Imported).unwrap();
        assert!(status.transition(GasOracleStatus::Pending).is_err());
        assert!(status.transition(GasOracleStatus::Failed).is_err());
        assert_eq!(status, GasOracleStatus::Imported);
    }
}
