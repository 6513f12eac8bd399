use signum_core::LedgerError;
use thiserror::Error;

pub type VmResult<T> = Result<T, VmError>;

/// Faults raised while executing a single instruction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("User stack overflow")]
    UserStackOverflow,

    #[error("User stack underflow")]
    UserStackUnderflow,

    #[error("Code stack overflow")]
    CodeStackOverflow,

    #[error("Code stack underflow")]
    CodeStackUnderflow,

    #[error("Invalid memory address: {0}")]
    InvalidAddress(u64),

    #[error("Unknown label: {0}")]
    UnknownLabel(String),

    #[error("Invalid instruction at line {line}: {text}")]
    InvalidInstruction { line: usize, text: String },

    #[error("Execution ran past the last instruction")]
    EndOfCode,

    #[error("Unknown contract: {0}")]
    UnknownContract(u64),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl VmError {
    /// Faults an `ERR` handler may catch. Everything else kills the contract.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VmError::DivisionByZero
                | VmError::UserStackOverflow
                | VmError::UserStackUnderflow
                | VmError::CodeStackOverflow
                | VmError::CodeStackUnderflow
                | VmError::InvalidAddress(_)
        )
    }
}

pub type DeployResult<T> = Result<T, DeployError>;

/// Problems found while loading a contract. Nothing is written to the
/// ledger when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeployError {
    #[error("Malformed directive at line {line}: {text}")]
    MalformedDirective { line: usize, text: String },

    #[error("Unknown directive at line {line}: {text}")]
    UnknownDirective { line: usize, text: String },

    #[error("Constant assigned to undeclared variable '{name}' at line {line}")]
    UndeclaredConstant { line: usize, name: String },

    #[error("Program has no executable instruction")]
    EmptyProgram,

    #[error("Invalid page configuration: {0}")]
    InvalidPages(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
