//! Serializable views of contract and ledger state for front ends.

use serde::Serialize;
use signum_core::{Account, Blockchain, IssuedAsset, MapEntry, Transaction};
use signum_types::message_array_to_hex;
use signum_vm::{Contract, ContractStatus, Controller, MemoryCell};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSnapshot {
    pub id: u64,
    pub creator: u64,
    pub status: ContractStatus,
    pub running: bool,
    pub stopped: bool,
    pub finished: bool,
    pub frozen: bool,
    pub dead: bool,
    pub ip: usize,
    pub pcs: usize,
    pub err: Option<usize>,
    /// Trimmed source text of the line at `ip`
    pub current_line: Option<String>,
    pub a: [u64; 4],
    pub b: [u64; 4],
    pub a_hex: String,
    pub b_hex: String,
    pub memory: Vec<MemoryCell>,
    pub user_stack: Vec<u64>,
    pub code_stack: Vec<usize>,
    pub balance: u64,
    pub previous_balance: u64,
    pub activation_amount: u64,
    pub sleep_until_block: Option<u64>,
    pub exception: Option<String>,
    pub enqueued: Vec<Transaction>,
    pub fees_paid: u64,
    pub steps: u64,
}

impl ContractSnapshot {
    pub fn capture(contract: &Contract, chain: &Blockchain) -> Self {
        Self {
            id: contract.id,
            creator: contract.creator,
            status: contract.status(),
            running: contract.running,
            stopped: contract.stopped,
            finished: contract.finished,
            frozen: contract.frozen,
            dead: contract.dead,
            ip: contract.ip,
            pcs: contract.pcs,
            err: contract.err,
            current_line: contract
                .program
                .source_line(contract.ip)
                .map(|text| text.trim().to_string()),
            a: contract.a,
            b: contract.b,
            a_hex: message_array_to_hex(&contract.a),
            b_hex: message_array_to_hex(&contract.b),
            memory: contract.memory.cells().to_vec(),
            user_stack: contract.user_stack.as_slice().to_vec(),
            code_stack: contract.code_stack.as_slice().to_vec(),
            balance: chain.balance(contract.id),
            previous_balance: contract.previous_balance,
            activation_amount: contract.activation_amount,
            sleep_until_block: contract.sleep_until_block,
            exception: contract.exception.clone(),
            enqueued: contract.enqueued.clone(),
            fees_paid: contract.fees_paid,
            steps: contract.steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub current_block: u64,
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    pub assets: Vec<IssuedAsset>,
    pub maps: Vec<MapEntry>,
}

impl LedgerSnapshot {
    pub fn capture(chain: &Blockchain) -> Self {
        Self {
            current_block: chain.current_block(),
            accounts: chain.accounts().to_vec(),
            transactions: chain.transactions().to_vec(),
            assets: chain.assets().to_vec(),
            maps: chain.maps().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSnapshot {
    pub ledger: LedgerSnapshot,
    pub contracts: Vec<ContractSnapshot>,
}

impl SimulationSnapshot {
    pub fn capture(controller: &Controller) -> Self {
        let chain = controller.blockchain();
        Self {
            ledger: LedgerSnapshot::capture(chain),
            contracts: controller
                .contracts()
                .iter()
                .map(|contract| ContractSnapshot::capture(contract, chain))
                .collect(),
        }
    }

    pub fn contract(&self, id: u64) -> Option<&ContractSnapshot> {
        self.contracts.iter().find(|c| c.id == id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signum_core::Transaction;
    use signum_vm::{Breakpoints, DeployOptions};

    #[test]
    fn test_contract_snapshot() {
        let mut controller = Controller::default();
        let id = controller
            .deploy(DeployOptions::new("^declare x\nSET @x #0000000000000005\nFUN set_A1 $x\nFIN"))
            .unwrap();
        controller.run_contract(id, &Breakpoints::new()).unwrap();

        let snapshot = SimulationSnapshot::capture(&controller);
        let contract = snapshot.contract(id).unwrap();
        assert_eq!(contract.status, ContractStatus::Finished);
        assert!(contract.finished);
        assert_eq!(contract.a, [5, 0, 0, 0]);
        assert_eq!(&contract.a_hex[..16], "0500000000000000");
        assert_eq!(contract.memory[0].name, "x");
        assert_eq!(contract.memory[0].value, 5);
        assert_eq!(contract.steps, 3);
        assert_eq!(contract.balance + contract.fees_paid, 1_000_000_000);
    }

    #[test]
    fn test_ledger_snapshot_json() {
        let mut controller = Controller::default();
        controller
            .blockchain_mut()
            .apply_transaction(Transaction::new(1, 2, 50, vec![], vec![], 1))
            .unwrap();

        let snapshot = SimulationSnapshot::capture(&controller);
        assert_eq!(snapshot.ledger.current_block, 1);
        assert_eq!(snapshot.ledger.transactions.len(), 1);

        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(json["ledger"]["currentBlock"], 1);
        assert_eq!(json["ledger"]["transactions"][0]["amount"], 50);
        assert!(json["contracts"].as_array().unwrap().is_empty());
    }
}
