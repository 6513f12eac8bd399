use serde::{Deserialize, Serialize};

/// Protocol constants shared by every contract in a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// NQT charged per fee unit
    pub fee_per_unit: u64,
    /// Fee units of a `FUN` instruction
    pub api_fee_units: u64,
    /// Fee units of every other instruction
    pub standard_fee_units: u64,
    /// Blocks a transaction must age before its ticket can be read
    pub random_sleep_blocks: u64,
    /// Activation amount used when a program does not set one
    pub default_activation_amount: u64,
    /// First id tried when assigning a contract id
    pub default_contract_id: u64,
    /// Creator used when a program does not set one
    pub default_creator_id: u64,
    /// Balance credited to a contract at deploy time
    pub default_deploy_balance: u64,
    /// Minutes per block, used to convert minutes into timestamps
    pub block_time_minutes: u64,
    pub user_stack_pages: u64,
    pub code_stack_pages: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            fee_per_unit: 735_000,
            api_fee_units: 10,
            standard_fee_units: 1,
            random_sleep_blocks: 15,
            default_activation_amount: 10_000_000,
            default_contract_id: 999,
            default_creator_id: 555,
            default_deploy_balance: 1_000_000_000,
            block_time_minutes: 4,
            user_stack_pages: 1,
            code_stack_pages: 1,
        }
    }
}
