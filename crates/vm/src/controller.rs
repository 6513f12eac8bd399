use crate::{
    config::ProtocolConfig,
    contract::{Contract, DeployOptions},
    error::{DeployResult, VmError, VmResult},
    execution::{Breakpoints, ExecutionResult, StepOutcome},
    interpreter::Interpreter,
};
use serde::Serialize;
use signum_core::{Blockchain, ContractRecord, Transaction, TransactionType};
use signum_crypto::sha256_bytes_to_word;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One contract's run during a block forge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRun {
    pub contract: u64,
    pub result: ExecutionResult,
}

/// What happened while forging one block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgeReport {
    /// Height the block was forged at
    pub height: u64,
    pub executed: Vec<ContractRun>,
    /// Ids of contract transactions written to the ledger
    pub dispatched: Vec<u64>,
    /// Ids of external transactions applied at this height
    pub applied: Vec<u64>,
    /// Contracts woken up for the next block
    pub activated: Vec<u64>,
}

/// Owns every deployed contract and the ledger they share.
#[derive(Debug, Clone)]
pub struct Controller {
    config: ProtocolConfig,
    blockchain: Blockchain,
    contracts: Vec<Contract>,
}

impl Controller {
    pub fn new(config: ProtocolConfig, blockchain: Blockchain) -> Self {
        Self {
            config,
            blockchain,
            contracts: Vec::new(),
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn blockchain_mut(&mut self) -> &mut Blockchain {
        &mut self.blockchain
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    pub fn contract(&self, id: u64) -> Option<&Contract> {
        self.contracts.iter().find(|contract| contract.id == id)
    }

    pub fn contract_mut(&mut self, id: u64) -> Option<&mut Contract> {
        self.contracts.iter_mut().find(|contract| contract.id == id)
    }

    /// Loads a contract, gives it an unused id and funds its account.
    pub fn deploy(&mut self, options: DeployOptions) -> DeployResult<u64> {
        let height = self.blockchain.current_block();
        let mut contract = Contract::load(&options, &self.config, height)?;

        let mut id = contract.id;
        while self.blockchain.has_account(id) || self.blockchain.is_contract(id) {
            id = id.wrapping_add(1);
        }
        contract.id = id;

        let balance = options
            .initial_balance
            .unwrap_or(self.config.default_deploy_balance);
        self.blockchain.credit(id, balance)?;
        self.blockchain.register_contract(ContractRecord {
            id,
            activation_amount: contract.activation_amount,
            code_hash: sha256_bytes_to_word(options.source.as_bytes()),
        });
        contract.previous_balance = self.blockchain.balance(id);

        info!(
            contract = id,
            creator = contract.creator,
            activation_amount = contract.activation_amount,
            lines = contract.program.len(),
            balance,
            "contract deployed"
        );
        self.contracts.push(contract);
        Ok(id)
    }

    pub fn step_contract(&mut self, id: u64, breakpoints: &Breakpoints) -> VmResult<StepOutcome> {
        let contract = self
            .contracts
            .iter_mut()
            .find(|contract| contract.id == id)
            .ok_or(VmError::UnknownContract(id))?;
        Ok(Interpreter::new(contract, &mut self.blockchain, &self.config).step(breakpoints))
    }

    pub fn run_contract(&mut self, id: u64, breakpoints: &Breakpoints) -> VmResult<ExecutionResult> {
        let contract = self
            .contracts
            .iter_mut()
            .find(|contract| contract.id == id)
            .ok_or(VmError::UnknownContract(id))?;
        Ok(Interpreter::new(contract, &mut self.blockchain, &self.config).run(breakpoints))
    }

    /// Runs every running contract, one after another.
    pub fn run_all(&mut self, breakpoints: &BTreeMap<u64, Breakpoints>) -> Vec<ContractRun> {
        let none = Breakpoints::new();
        let mut runs = Vec::new();
        for contract in self.contracts.iter_mut().filter(|contract| contract.running) {
            let id = contract.id;
            let result = Interpreter::new(contract, &mut self.blockchain, &self.config)
                .run(breakpoints.get(&id).unwrap_or(&none));
            runs.push(ContractRun {
                contract: id,
                result,
            });
        }
        runs
    }

    /// Moves every enqueued outbound transaction onto the ledger. Nothing is
    /// applied and every queue is kept when any credit would overflow.
    pub fn dispatch_enqueued(&mut self) -> VmResult<Vec<u64>> {
        self.blockchain.check_credits(
            self.contracts
                .iter()
                .flat_map(|contract| contract.enqueued.iter())
                .map(|tx| (tx.recipient, tx.amount)),
        )?;
        let mut ids = Vec::new();
        for contract in &mut self.contracts {
            let mut pending = std::mem::take(&mut contract.enqueued).into_iter();
            while let Some(mut tx) = pending.next() {
                tx.tx_type = TransactionType::classify(&tx.tokens, &tx.message);
                let recipient = tx.recipient;
                match self.blockchain.apply_transaction(tx.clone()) {
                    Ok(id) => {
                        debug!(contract = contract.id, recipient, tx = id, "dispatched");
                        ids.push(id);
                    }
                    Err(err) => {
                        contract.enqueued = std::iter::once(tx).chain(pending).collect();
                        return Err(err.into());
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Applies the external transactions declared for the current height,
    /// all of them or none.
    pub fn apply_external(&mut self, transactions: &[Transaction]) -> VmResult<Vec<u64>> {
        let height = self.blockchain.current_block();
        let due: Vec<&Transaction> = transactions
            .iter()
            .filter(|tx| tx.blockheight == height)
            .collect();
        self.blockchain
            .check_credits(due.iter().map(|tx| (tx.recipient, tx.amount)))?;
        let mut ids = Vec::new();
        for tx in due {
            ids.push(self.blockchain.apply_transaction(tx.clone())?);
        }
        Ok(ids)
    }

    /// Wakes contracts whose sleep ended or that received an activating
    /// transaction.
    pub fn activate(&mut self) -> Vec<u64> {
        let height = self.blockchain.current_block();
        let mut woken = Vec::new();
        for contract in &mut self.contracts {
            if contract.dead || contract.running {
                continue;
            }
            let wake = match contract.sleep_until_block {
                Some(until_block) => until_block <= height,
                None if contract.activation_amount == 0 => true,
                None => self
                    .blockchain
                    .consume_activation(contract.id, contract.activation_amount)
                    .is_some(),
            };
            if wake {
                debug!(contract = contract.id, height, "reactivated");
                contract.reactivate();
                woken.push(contract.id);
            }
        }
        woken
    }

    pub fn forge_block(&mut self, external: &[Transaction]) -> VmResult<ForgeReport> {
        self.forge_block_with_breakpoints(external, &BTreeMap::new())
    }

    /// Runs pending contracts, dispatches their payments, applies external
    /// transactions, advances the height and runs activation checks.
    ///
    /// A failed forge leaves the ledger and every contract as they were
    /// before the call, at the same height.
    pub fn forge_block_with_breakpoints(
        &mut self,
        external: &[Transaction],
        breakpoints: &BTreeMap<u64, Breakpoints>,
    ) -> VmResult<ForgeReport> {
        let height = self.blockchain.current_block();
        let blockchain = self.blockchain.clone();
        let contracts = self.contracts.clone();
        match self.forge_staged(external, breakpoints) {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!(height, error = %err, "block forge rolled back");
                self.blockchain = blockchain;
                self.contracts = contracts;
                Err(err)
            }
        }
    }

    fn forge_staged(
        &mut self,
        external: &[Transaction],
        breakpoints: &BTreeMap<u64, Breakpoints>,
    ) -> VmResult<ForgeReport> {
        let height = self.blockchain.current_block();
        let executed = self.run_all(breakpoints);
        let dispatched = self.dispatch_enqueued()?;
        let applied = self.apply_external(external)?;
        self.blockchain.advance_block();
        let activated = self.activate();

        info!(
            height,
            executed = executed.len(),
            dispatched = dispatched.len(),
            applied = applied.len(),
            activated = activated.len(),
            "block forged"
        );
        Ok(ForgeReport {
            height,
            executed,
            dispatched,
            applied,
            activated,
        })
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ProtocolConfig::default(), Blockchain::default())
    }
}
