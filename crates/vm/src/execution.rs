use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Line indices at which a run loop pauses.
pub type Breakpoints = BTreeSet<usize>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HaltReason {
    /// The contract was not running when asked to execute
    NotRunning,
    Stopped,
    Sleeping { until_block: u64 },
    Finished,
    /// Balance could not cover the next instruction's fee
    OutOfBalance,
    Dead(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StepOutcome {
    /// Still running, no breakpoint at the new instruction pointer
    Continue,
    Breakpoint(usize),
    Halted(HaltReason),
}

impl StepOutcome {
    pub fn is_halt(&self) -> bool {
        matches!(self, StepOutcome::Halted(_))
    }
}

/// Summary of one run loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub steps: u64,
    pub fees: u64,
    /// Why the loop ended; never `Continue`
    pub outcome: StepOutcome,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::NotRunning => write!(f, "contract is not running"),
            HaltReason::Stopped => write!(f, "stopped"),
            HaltReason::Sleeping { until_block } => write!(f, "sleeping until block {until_block}"),
            HaltReason::Finished => write!(f, "finished"),
            HaltReason::OutOfBalance => write!(f, "frozen: not enough balance for the next instruction"),
            HaltReason::Dead(exception) => write!(f, "dead: {exception}"),
        }
    }
}
