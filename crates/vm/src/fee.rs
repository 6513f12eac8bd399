use crate::config::ProtocolConfig;
use crate::opcodes::{Instruction, Line};

/// Fee category of a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeClass {
    /// Blank lines, labels, directives and unparseable lines
    Free,
    Standard,
    /// `FUN` calls into the API table
    Api,
}

impl FeeClass {
    pub fn of_line(line: &Line) -> Self {
        match line {
            Line::Code(instruction) => Self::of_instruction(instruction),
            _ => FeeClass::Free,
        }
    }

    pub fn of_instruction(instruction: &Instruction) -> Self {
        match instruction {
            Instruction::Call { .. } => FeeClass::Api,
            _ => FeeClass::Standard,
        }
    }
}

/// Converts fee classes into NQT amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    fee_per_unit: u64,
    standard_units: u64,
    api_units: u64,
}

impl FeeSchedule {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            fee_per_unit: config.fee_per_unit,
            standard_units: config.standard_fee_units,
            api_units: config.api_fee_units,
        }
    }

    pub fn units(&self, class: FeeClass) -> u64 {
        match class {
            FeeClass::Free => 0,
            FeeClass::Standard => self.standard_units,
            FeeClass::Api => self.api_units,
        }
    }

    pub fn fee(&self, class: FeeClass) -> u64 {
        self.units(class).saturating_mul(self.fee_per_unit)
    }

    pub fn fee_per_unit(&self) -> u64 {
        self.fee_per_unit
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::new(&ProtocolConfig::default())
    }
}
