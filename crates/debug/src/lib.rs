use signum_vm::VmError;
use thiserror::Error;

pub mod debugger;
pub mod snapshot;

pub use debugger::{DebugStatus, Debugger};
pub use snapshot::{ContractSnapshot, LedgerSnapshot, SimulationSnapshot};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DebugError {
    #[error("Contract {0} not found")]
    ContractNotFound(u64),

    #[error("Line {line} is not an executable instruction of contract {contract}")]
    NotExecutable { contract: u64, line: usize },

    #[error("VM error: {0}")]
    Vm(#[from] VmError),
}

pub type Result<T> = std::result::Result<T, DebugError>;
