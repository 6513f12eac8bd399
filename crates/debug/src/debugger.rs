use serde::Serialize;
use signum_vm::{Breakpoints, Controller, HaltReason, Instruction, Line, StepOutcome};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::{DebugError, Result};

/// Where a debug command left the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DebugStatus {
    /// Still running; `line` is the next instruction
    Paused { line: usize, steps: u64 },
    Breakpoint { line: usize, steps: u64 },
    Halted { line: usize, steps: u64, reason: HaltReason },
}

impl DebugStatus {
    pub fn line(&self) -> usize {
        match self {
            DebugStatus::Paused { line, .. }
            | DebugStatus::Breakpoint { line, .. }
            | DebugStatus::Halted { line, .. } => *line,
        }
    }

    pub fn steps(&self) -> u64 {
        match self {
            DebugStatus::Paused { steps, .. }
            | DebugStatus::Breakpoint { steps, .. }
            | DebugStatus::Halted { steps, .. } => *steps,
        }
    }
}

impl fmt::Display for DebugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugStatus::Paused { line, steps } => {
                write!(f, "Paused at line {line} after {steps} instruction(s)")
            }
            DebugStatus::Breakpoint { line, steps } => {
                write!(f, "Breakpoint hit at line {line} after {steps} instruction(s)")
            }
            DebugStatus::Halted {
                line,
                steps,
                reason,
            } => write!(
                f,
                "Contract {reason} at line {line} after {steps} instruction(s)"
            ),
        }
    }
}

/// Per-contract breakpoints and the run/step commands built on them.
#[derive(Debug, Clone, Default)]
pub struct Debugger {
    breakpoints: BTreeMap<u64, Breakpoints>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears a breakpoint. Returns whether it is now set.
    pub fn toggle_breakpoint(
        &mut self,
        controller: &Controller,
        contract: u64,
        line: usize,
    ) -> Result<bool> {
        let target = controller
            .contract(contract)
            .ok_or(DebugError::ContractNotFound(contract))?;
        if !target
            .program
            .line(line)
            .map_or(false, |parsed| parsed.is_executable())
        {
            return Err(DebugError::NotExecutable { contract, line });
        }

        let set = self.breakpoints.entry(contract).or_default();
        let enabled = if set.remove(&line) {
            false
        } else {
            set.insert(line);
            true
        };
        debug!(contract, line, enabled, "breakpoint toggled");
        Ok(enabled)
    }

    pub fn clear_all_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn breakpoints(&self, contract: u64) -> Breakpoints {
        self.breakpoints.get(&contract).cloned().unwrap_or_default()
    }

    pub fn all_breakpoints(&self) -> &BTreeMap<u64, Breakpoints> {
        &self.breakpoints
    }

    /// Runs until a halt or a breakpoint.
    pub fn run(&self, controller: &mut Controller, contract: u64) -> Result<DebugStatus> {
        let result = controller.run_contract(contract, &self.breakpoints(contract))?;
        Ok(self.status(controller, contract, result.steps, result.outcome))
    }

    /// Executes exactly one instruction.
    pub fn step_into(&self, controller: &mut Controller, contract: u64) -> Result<DebugStatus> {
        let before = steps_taken(controller, contract)?;
        let outcome = controller.step_contract(contract, &self.breakpoints(contract))?;
        let steps = steps_taken(controller, contract)? - before;
        Ok(self.status(controller, contract, steps, outcome))
    }

    /// Like [`step_into`](Self::step_into), but a `JSR` runs until its
    /// subroutine returns.
    pub fn step_over(&self, controller: &mut Controller, contract: u64) -> Result<DebugStatus> {
        let target = controller
            .contract(contract)
            .ok_or(DebugError::ContractNotFound(contract))?;
        let next = target.program.next_executable(target.ip);
        let is_call = matches!(
            next.and_then(|line| target.program.line(line)),
            Some(Line::Code(Instruction::JumpSub(_)))
        );
        if !is_call {
            return self.step_into(controller, contract);
        }
        let depth = target.code_stack.len();
        self.step_while(controller, contract, |current| current > depth)
    }

    /// Runs until the current subroutine returns to its caller.
    pub fn step_out(&self, controller: &mut Controller, contract: u64) -> Result<DebugStatus> {
        let depth = controller
            .contract(contract)
            .ok_or(DebugError::ContractNotFound(contract))?
            .code_stack
            .len();
        if depth == 0 {
            return self.run(controller, contract);
        }
        self.step_while(controller, contract, |current| current >= depth)
    }

    /// Steps once, then keeps stepping while `keep_going` holds for the code
    /// stack depth.
    fn step_while(
        &self,
        controller: &mut Controller,
        contract: u64,
        keep_going: impl Fn(usize) -> bool,
    ) -> Result<DebugStatus> {
        let breakpoints = self.breakpoints(contract);
        let before = steps_taken(controller, contract)?;
        loop {
            let outcome = controller.step_contract(contract, &breakpoints)?;
            let depth = controller
                .contract(contract)
                .ok_or(DebugError::ContractNotFound(contract))?
                .code_stack
                .len();
            if outcome != StepOutcome::Continue || !keep_going(depth) {
                let steps = steps_taken(controller, contract)? - before;
                return Ok(self.status(controller, contract, steps, outcome));
            }
        }
    }

    fn status(
        &self,
        controller: &Controller,
        contract: u64,
        steps: u64,
        outcome: StepOutcome,
    ) -> DebugStatus {
        let line = controller.contract(contract).map_or(0, |c| c.ip);
        match outcome {
            StepOutcome::Continue => DebugStatus::Paused { line, steps },
            StepOutcome::Breakpoint(line) => DebugStatus::Breakpoint { line, steps },
            StepOutcome::Halted(reason) => DebugStatus::Halted {
                line,
                steps,
                reason,
            },
        }
    }
}

fn steps_taken(controller: &Controller, contract: u64) -> Result<u64> {
    controller
        .contract(contract)
        .map(|c| c.steps)
        .ok_or(DebugError::ContractNotFound(contract))
}

#[cfg(test)]
mod tests {
    use super::*;
    use signum_vm::DeployOptions;

    const SOURCE: &str = "^declare n\n\
                          JSR :sub\n\
                          INC @n\n\
                          FIN\n\
                          sub:\n\
                          INC @n\n\
                          INC @n\n\
                          RET";

    fn setup() -> (Controller, u64) {
        let mut controller = Controller::default();
        let id = controller.deploy(DeployOptions::new(SOURCE)).unwrap();
        (controller, id)
    }

    #[test]
    fn test_toggle_breakpoint() {
        let (controller, id) = setup();
        let mut debugger = Debugger::new();
        assert!(debugger.toggle_breakpoint(&controller, id, 2).unwrap());
        assert_eq!(debugger.breakpoints(id), Breakpoints::from([2]));
        assert!(!debugger.toggle_breakpoint(&controller, id, 2).unwrap());
        assert!(debugger.breakpoints(id).is_empty());
        assert_eq!(
            debugger.toggle_breakpoint(&controller, id, 4),
            Err(DebugError::NotExecutable { contract: id, line: 4 })
        );
        assert_eq!(
            debugger.toggle_breakpoint(&controller, 1, 2),
            Err(DebugError::ContractNotFound(1))
        );
        debugger.toggle_breakpoint(&controller, id, 3).unwrap();
        debugger.clear_all_breakpoints();
        assert!(debugger.all_breakpoints().is_empty());
    }

    #[test]
    fn test_run_stops_at_breakpoint() {
        let (mut controller, id) = setup();
        let mut debugger = Debugger::new();
        debugger.toggle_breakpoint(&controller, id, 6).unwrap();
        let status = debugger.run(&mut controller, id).unwrap();
        assert_eq!(status, DebugStatus::Breakpoint { line: 6, steps: 2 });
        assert_eq!(status.to_string(), "Breakpoint hit at line 6 after 2 instruction(s)");
    }

    #[test]
    fn test_step_over_runs_whole_subroutine() {
        let (mut controller, id) = setup();
        let debugger = Debugger::new();
        let status = debugger.step_over(&mut controller, id).unwrap();
        assert_eq!(status, DebugStatus::Paused { line: 2, steps: 4 });
        assert_eq!(controller.contract(id).unwrap().memory.read("n"), 2);

        let status = debugger.step_over(&mut controller, id).unwrap();
        assert_eq!(status, DebugStatus::Paused { line: 3, steps: 1 });
    }

    #[test]
    fn test_step_into_and_out() {
        let (mut controller, id) = setup();
        let debugger = Debugger::new();
        assert_eq!(
            debugger.step_into(&mut controller, id).unwrap(),
            DebugStatus::Paused { line: 5, steps: 1 }
        );
        let status = debugger.step_out(&mut controller, id).unwrap();
        assert_eq!(status, DebugStatus::Paused { line: 2, steps: 3 });
        assert!(controller.contract(id).unwrap().code_stack.is_empty());

        let status = debugger.step_out(&mut controller, id).unwrap();
        assert!(matches!(
            status,
            DebugStatus::Halted {
                reason: HaltReason::Finished,
                ..
            }
        ));
        assert!(status.to_string().contains("finished"));
    }
}
