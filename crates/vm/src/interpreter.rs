use crate::{
    api::{ApiContext, ApiOutcome},
    config::ProtocolConfig,
    contract::Contract,
    error::{VmError, VmResult},
    execution::{Breakpoints, ExecutionResult, HaltReason, StepOutcome},
    fee::{FeeClass, FeeSchedule},
    opcodes::{ArithOp, Instruction, Line},
};
use signum_core::Blockchain;
use signum_types::{signed_to_unsigned, unsigned_to_signed};
use std::sync::Arc;
use tracing::{debug, trace};

/// Control transfer requested by an executed instruction.
#[derive(Clone, Copy)]
enum Flow {
    Next,
    Jump(usize),
    Stop,
    Sleep(u64),
    Finish,
    /// Sleep without advancing, so the same line runs again on wake-up.
    Retry(u64),
}

/// Executes one contract against the ledger.
pub struct Interpreter<'a> {
    contract: &'a mut Contract,
    chain: &'a mut Blockchain,
    config: &'a ProtocolConfig,
    fees: FeeSchedule,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        contract: &'a mut Contract,
        chain: &'a mut Blockchain,
        config: &'a ProtocolConfig,
    ) -> Self {
        Self {
            contract,
            chain,
            config,
            fees: FeeSchedule::new(config),
        }
    }

    /// Steps until the contract halts or lands on a breakpoint.
    pub fn run(&mut self, breakpoints: &Breakpoints) -> ExecutionResult {
        let steps_before = self.contract.steps;
        let fees_before = self.contract.fees_paid;
        loop {
            let outcome = self.step(breakpoints);
            if outcome != StepOutcome::Continue {
                return ExecutionResult {
                    steps: self.contract.steps - steps_before,
                    fees: self.contract.fees_paid - fees_before,
                    outcome,
                };
            }
        }
    }

    /// Executes exactly one instruction.
    pub fn step(&mut self, breakpoints: &Breakpoints) -> StepOutcome {
        if !self.contract.running {
            return StepOutcome::Halted(HaltReason::NotRunning);
        }

        let program = Arc::clone(&self.contract.program);
        let Some(line) = program.next_executable(self.contract.ip) else {
            return self.die(VmError::EndOfCode);
        };
        self.contract.ip = line;

        let instruction = match program.line(line) {
            Some(Line::Code(instruction)) => instruction,
            _ => {
                let text = program.source_line(line).unwrap_or_default().trim().to_string();
                return self.die(VmError::InvalidInstruction { line, text });
            }
        };

        let id = self.contract.id;
        let fee = self.fees.fee(FeeClass::of_instruction(instruction));
        let balance = self.chain.balance(id);
        if balance < fee {
            debug!(contract = id, line, fee, balance, "out of balance, freezing");
            self.contract.frozen = true;
            self.contract.stopped = true;
            self.contract.halt(balance);
            return StepOutcome::Halted(HaltReason::OutOfBalance);
        }
        if let Err(err) = self.chain.debit(id, fee) {
            return self.die(err.into());
        }
        self.contract.fees_paid += fee;
        self.contract.steps += 1;
        trace!(contract = id, line, fee, %instruction, "step");

        let outcome = match self.execute(line, instruction) {
            Ok(flow) => self.apply(line, flow),
            Err(err) => match self.contract.err {
                Some(handler) if err.is_recoverable() => {
                    debug!(contract = id, line, handler, %err, "fault redirected to handler");
                    self.goto(handler);
                    StepOutcome::Continue
                }
                _ => return self.die(err),
            },
        };

        if outcome == StepOutcome::Continue && breakpoints.contains(&self.contract.ip) {
            return StepOutcome::Breakpoint(self.contract.ip);
        }
        outcome
    }

    fn goto(&mut self, line: usize) {
        let program = &self.contract.program;
        self.contract.ip = program.next_executable(line).unwrap_or(program.len());
    }

    fn halt(&mut self) {
        let balance = self.chain.balance(self.contract.id);
        self.contract.halt(balance);
    }

    fn die(&mut self, err: VmError) -> StepOutcome {
        let balance = self.chain.balance(self.contract.id);
        let exception = err.to_string();
        self.contract.kill(exception.clone(), balance);
        StepOutcome::Halted(HaltReason::Dead(exception))
    }

    fn apply(&mut self, line: usize, flow: Flow) -> StepOutcome {
        match flow {
            Flow::Next => {
                self.goto(line + 1);
                StepOutcome::Continue
            }
            Flow::Jump(target) => {
                self.goto(target);
                StepOutcome::Continue
            }
            Flow::Stop => {
                self.goto(line + 1);
                self.contract.stopped = true;
                self.halt();
                debug!(contract = self.contract.id, line, "stopped");
                StepOutcome::Halted(HaltReason::Stopped)
            }
            Flow::Sleep(until_block) | Flow::Retry(until_block) => {
                if matches!(flow, Flow::Sleep(_)) {
                    self.goto(line + 1);
                }
                self.contract.stopped = true;
                self.contract.sleep_until_block = Some(until_block);
                self.halt();
                debug!(contract = self.contract.id, line, until_block, "sleeping");
                StepOutcome::Halted(HaltReason::Sleeping { until_block })
            }
            Flow::Finish => {
                self.contract.ip = self.contract.pcs;
                self.contract.finished = true;
                self.contract.frozen = true;
                self.halt();
                debug!(contract = self.contract.id, line, "finished");
                StepOutcome::Halted(HaltReason::Finished)
            }
        }
    }

    fn resolve(&self, label: &str) -> VmResult<usize> {
        self.contract
            .program
            .label(label)
            .ok_or_else(|| VmError::UnknownLabel(label.to_string()))
    }

    fn read(&self, name: &str) -> u64 {
        self.contract.memory.read(name)
    }

    fn write(&mut self, name: &str, value: u64) {
        self.contract.memory.write(name, value);
    }

    fn execute(&mut self, line: usize, instruction: &Instruction) -> VmResult<Flow> {
        match instruction {
            Instruction::SetValue { target, value } => self.write(target, *value),
            Instruction::SetVar { target, source } => self.write(target, self.read(source)),
            Instruction::Clear(target) => self.write(target, 0),
            Instruction::Increment(target) => self.write(target, self.read(target).wrapping_add(1)),
            Instruction::Decrement(target) => self.write(target, self.read(target).wrapping_sub(1)),
            Instruction::Not(target) => self.write(target, !self.read(target)),
            Instruction::Arith { op, target, source } => {
                let value = arith(*op, self.read(target), self.read(source))?;
                self.write(target, value);
            }
            Instruction::LoadIndirect { target, pointer } => {
                let value = self.contract.memory.read_at(self.read(pointer))?;
                self.write(target, value);
            }
            Instruction::LoadIndexed {
                target,
                base,
                offset,
            } => {
                let address = self.read(base).wrapping_add(self.read(offset));
                let value = self.contract.memory.read_at(address)?;
                self.write(target, value);
            }
            Instruction::StoreIndirect { pointer, source } => {
                let (address, value) = (self.read(pointer), self.read(source));
                self.contract.memory.write_at(address, value)?;
            }
            Instruction::StoreIndexed {
                base,
                offset,
                source,
            } => {
                let address = self.read(base).wrapping_add(self.read(offset));
                let value = self.read(source);
                self.contract.memory.write_at(address, value)?;
            }
            Instruction::Push(source) => {
                let value = self.read(source);
                self.contract.user_stack.push(value)?;
            }
            Instruction::Pop(target) => {
                let value = self.contract.user_stack.pop()?;
                self.write(target, value);
            }
            Instruction::JumpSub(label) => {
                let target = self.resolve(label)?;
                self.contract.code_stack.push(line + 1)?;
                return Ok(Flow::Jump(target));
            }
            Instruction::Return => return Ok(Flow::Jump(self.contract.code_stack.pop()?)),
            Instruction::Jump(label) => return Ok(Flow::Jump(self.resolve(label)?)),
            Instruction::SetErrorHandler(label) => self.contract.err = Some(self.resolve(label)?),
            Instruction::SetPcs => {
                let program = &self.contract.program;
                self.contract.pcs = program.next_executable(line + 1).unwrap_or(program.len());
            }
            Instruction::Nop => {}
            Instruction::BranchZero { source, label } => {
                if self.read(source) == 0 {
                    return Ok(Flow::Jump(self.resolve(label)?));
                }
            }
            Instruction::BranchNotZero { source, label } => {
                if self.read(source) != 0 {
                    return Ok(Flow::Jump(self.resolve(label)?));
                }
            }
            Instruction::Branch {
                cond,
                left,
                right,
                label,
            } => {
                let left = unsigned_to_signed(self.read(left));
                let right = unsigned_to_signed(self.read(right));
                if cond.holds(left, right) {
                    return Ok(Flow::Jump(self.resolve(label)?));
                }
            }
            Instruction::MulDiv {
                target,
                multiplier,
                divisor,
            } => {
                let divisor = unsigned_to_signed(self.read(divisor)) as i128;
                if divisor == 0 {
                    return Err(VmError::DivisionByZero);
                }
                let product = unsigned_to_signed(self.read(target)) as i128
                    * unsigned_to_signed(self.read(multiplier)) as i128;
                self.write(target, signed_to_unsigned(product / divisor));
            }
            Instruction::Sleep(blocks) => {
                let blocks = blocks.as_deref().map(|name| self.read(name)).unwrap_or(1);
                let height = self.chain.current_block();
                return Ok(Flow::Sleep(height.saturating_add(blocks.max(1))));
            }
            Instruction::FinishIfZero(source) => {
                if self.read(source) == 0 {
                    return Ok(Flow::Finish);
                }
            }
            Instruction::StopIfZero(source) => {
                if self.read(source) == 0 {
                    return Ok(Flow::Stop);
                }
            }
            Instruction::Finish => return Ok(Flow::Finish),
            Instruction::Stop => return Ok(Flow::Stop),
            Instruction::Call {
                function,
                result,
                args,
            } => {
                let mut values = [0u64; 2];
                for (slot, name) in values.iter_mut().zip(args) {
                    *slot = self.read(name);
                }
                let outcome = ApiContext {
                    contract: &mut *self.contract,
                    chain: &mut *self.chain,
                    config: self.config,
                }
                .call(*function, values)?;
                return Ok(match outcome {
                    ApiOutcome::Value(value) => {
                        if let Some(result) = result {
                            self.write(result, value);
                        }
                        Flow::Next
                    }
                    ApiOutcome::Sleep { until_block } => {
                        if let Some(result) = result {
                            self.write(result, 0);
                        }
                        Flow::Retry(until_block)
                    }
                });
            }
        }
        Ok(Flow::Next)
    }
}

/// `OP @a $b` semantics. Division and modulo are signed.
fn arith(op: ArithOp, a: u64, b: u64) -> VmResult<u64> {
    Ok(match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::Div | ArithOp::Mod => {
            let divisor = unsigned_to_signed(b);
            if divisor == 0 {
                return Err(VmError::DivisionByZero);
            }
            let dividend = unsigned_to_signed(a);
            let value = if op == ArithOp::Div {
                dividend.wrapping_div(divisor)
            } else {
                dividend.wrapping_rem(divisor)
            };
            value as u64
        }
        ArithOp::Bor => a | b,
        ArithOp::And => a & b,
        ArithOp::Xor => a ^ b,
        ArithOp::Shl => a.checked_shl(b.min(64) as u32).unwrap_or(0),
        ArithOp::Shr => a.checked_shr(b.min(64) as u32).unwrap_or(0),
    })
}
