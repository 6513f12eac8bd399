use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state derived from a contract's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractStatus {
    Running,
    /// Waiting for an activating transaction
    Stopped,
    Sleeping { until_block: u64 },
    /// Ran out of balance mid-execution
    FrozenStopped,
    /// Finished and waiting to be reactivated at its PCS marker
    Finished,
    Dead,
}

impl ContractStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Dead)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractStatus::Running => write!(f, "running"),
            ContractStatus::Stopped => write!(f, "stopped"),
            ContractStatus::Sleeping { until_block } => {
                write!(f, "sleeping until block {until_block}")
            }
            ContractStatus::FrozenStopped => write!(f, "frozen (out of balance)"),
            ContractStatus::Finished => write!(f, "finished"),
            ContractStatus::Dead => write!(f, "dead"),
        }
    }
}
