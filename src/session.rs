use crate::config::Config;
use crate::scenario::{parse_scenario, ScenarioError, ScenarioTransaction};
use signum_core::{Blockchain, Transaction};
use signum_debug::{ContractSnapshot, DebugError, DebugStatus, Debugger, SimulationSnapshot};
use signum_vm::{Controller, DeployError, DeployOptions, ForgeReport, VmError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Deploy failed: {0}")]
    Deploy(#[from] DeployError),

    #[error("VM error: {0}")]
    Vm(#[from] VmError),

    #[error("Debugger error: {0}")]
    Debug(#[from] DebugError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Contract {0} not found")]
    ContractNotFound(u64),
}

pub type Result<T> = std::result::Result<T, SimulatorError>;

/// A simulation session: ledger, contracts, debugger and the pending
/// scenario transactions.
pub struct Simulator {
    config: Config,
    controller: Controller,
    debugger: Debugger,
    scenario: Vec<ScenarioTransaction>,
}

impl Simulator {
    pub fn new(config: Config) -> Self {
        let blockchain = Blockchain::new(config.simulation.start_block, config.simulation.rng_seed);
        let controller = Controller::new(config.protocol.clone(), blockchain);
        Self {
            config,
            controller,
            debugger: Debugger::new(),
            scenario: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    pub fn current_block(&self) -> u64 {
        self.controller.blockchain().current_block()
    }

    /// Replaces the pending scenario. A malformed batch leaves the previous
    /// one in place.
    pub fn load_scenario(&mut self, json: &str) -> Result<usize> {
        let transactions = parse_scenario(json)?;
        info!(transactions = transactions.len(), "scenario loaded");
        self.scenario = transactions;
        Ok(self.scenario.len())
    }

    pub fn add_transaction(&mut self, transaction: ScenarioTransaction) {
        self.scenario.push(transaction);
    }

    pub fn scenario(&self) -> &[ScenarioTransaction] {
        &self.scenario
    }

    pub fn deploy(&mut self, options: DeployOptions) -> Result<u64> {
        Ok(self.controller.deploy(options)?)
    }

    pub fn deploy_source(&mut self, source: &str) -> Result<u64> {
        self.deploy(DeployOptions::new(source))
    }

    /// Forges one block, applying the scenario transactions declared for the
    /// current height.
    pub fn forge_block(&mut self) -> Result<ForgeReport> {
        let height = self.current_block();
        let external: Vec<Transaction> = self
            .scenario
            .iter()
            .filter(|tx| tx.blockheight == height)
            .map(ScenarioTransaction::to_transaction)
            .collect();
        let report = self
            .controller
            .forge_block_with_breakpoints(&external, self.debugger.all_breakpoints())?;
        Ok(report)
    }

    pub fn forge_blocks(&mut self, count: u64) -> Result<Vec<ForgeReport>> {
        (0..count).map(|_| self.forge_block()).collect()
    }

    pub fn toggle_breakpoint(&mut self, contract: u64, line: usize) -> Result<bool> {
        Ok(self
            .debugger
            .toggle_breakpoint(&self.controller, contract, line)?)
    }

    pub fn clear_all_breakpoints(&mut self) {
        self.debugger.clear_all_breakpoints();
    }

    pub fn run(&mut self, contract: u64) -> Result<DebugStatus> {
        Ok(self.debugger.run(&mut self.controller, contract)?)
    }

    pub fn step_into(&mut self, contract: u64) -> Result<DebugStatus> {
        Ok(self.debugger.step_into(&mut self.controller, contract)?)
    }

    pub fn step_over(&mut self, contract: u64) -> Result<DebugStatus> {
        Ok(self.debugger.step_over(&mut self.controller, contract)?)
    }

    pub fn step_out(&mut self, contract: u64) -> Result<DebugStatus> {
        Ok(self.debugger.step_out(&mut self.controller, contract)?)
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot::capture(&self.controller)
    }

    pub fn contract_snapshot(&self, contract: u64) -> Result<ContractSnapshot> {
        let target = self
            .controller
            .contract(contract)
            .ok_or(SimulatorError::ContractNotFound(contract))?;
        Ok(ContractSnapshot::capture(target, self.controller.blockchain()))
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signum_core::LedgerError;

    #[test]
    fn test_scenario_applied_at_its_height() {
        let mut sim = Simulator::default();
        sim.load_scenario(
            r#"[{"sender": 7, "recipient": 8, "amount": 100, "blockheight": 2}]"#,
        )
        .unwrap();

        let first = sim.forge_block().unwrap();
        assert_eq!(first.height, 1);
        assert!(first.applied.is_empty());

        let second = sim.forge_block().unwrap();
        assert_eq!(second.height, 2);
        assert_eq!(second.applied.len(), 1);
        assert_eq!(sim.controller().blockchain().balance(8), 100);
        assert_eq!(sim.current_block(), 3);
    }

    #[test]
    fn test_malformed_scenario_keeps_previous() {
        let mut sim = Simulator::default();
        sim.load_scenario(r#"[{"sender": 1, "recipient": 2, "amount": 3, "blockheight": 1}]"#)
            .unwrap();
        let err = sim.load_scenario(r#"[{"sender": "x", "recipient": 2, "amount": 3, "blockheight": 1}]"#);
        assert!(matches!(err, Err(SimulatorError::Scenario(_))));
        assert_eq!(sim.scenario().len(), 1);
    }

    #[test]
    fn test_overflowing_block_leaves_simulation_untouched() {
        let mut sim = Simulator::default();
        let id = sim.deploy_source("^declare a\nINC @a\nFIN").unwrap();
        sim.load_scenario(
            r#"[{"sender": 7, "recipient": 5, "amount": "18446744073709551615", "blockheight": 1},
                {"sender": 7, "recipient": 5, "amount": 1, "blockheight": 1}]"#,
        )
        .unwrap();

        let err = sim.forge_block();
        assert!(matches!(
            err,
            Err(SimulatorError::Vm(VmError::Ledger(LedgerError::BalanceOverflow(5))))
        ));
        let chain = sim.controller().blockchain();
        assert!(chain.transactions().is_empty());
        assert_eq!(chain.balance(5), 0);
        assert_eq!(sim.current_block(), 1);
        let contract = sim.controller().contract(id).unwrap();
        assert!(contract.running);
        assert!(contract.enqueued.is_empty());
        assert_eq!(contract.memory.read("a"), 0);

        sim.load_scenario(r#"[{"sender": 7, "recipient": 5, "amount": 1, "blockheight": 1}]"#)
            .unwrap();
        let report = sim.forge_block().unwrap();
        assert_eq!(report.applied.len(), 1);
        assert_eq!(sim.controller().blockchain().balance(5), 1);
        assert_eq!(sim.controller().contract(id).unwrap().memory.read("a"), 1);
        assert_eq!(sim.current_block(), 2);
    }

    #[test]
    fn test_start_block_from_config() {
        let mut config = Config::default();
        config.simulation.start_block = 50;
        let sim = Simulator::new(config);
        assert_eq!(sim.current_block(), 50);
        assert!(matches!(
            sim.contract_snapshot(1),
            Err(SimulatorError::ContractNotFound(1))
        ));
    }
}
