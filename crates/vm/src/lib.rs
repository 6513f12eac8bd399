pub mod api;
pub mod config;
pub mod contract;
pub mod controller;
pub mod error;
pub mod execution;
pub mod fee;
pub mod interpreter;
pub mod memory;
pub mod opcodes;
pub mod program;
pub mod stack;
pub mod state;

#[cfg(test)]
mod tests;

pub use api::{ApiFunction, CallShape};
pub use config::ProtocolConfig;
pub use contract::{Contract, DeployOptions};
pub use controller::{ContractRun, Controller, ForgeReport};
pub use error::{DeployError, DeployResult, VmError, VmResult};
pub use execution::{Breakpoints, ExecutionResult, HaltReason, StepOutcome};
pub use fee::{FeeClass, FeeSchedule};
pub use interpreter::Interpreter;
pub use memory::MemoryCell;
pub use opcodes::{Instruction, Line};
pub use program::Program;
pub use state::ContractStatus;
