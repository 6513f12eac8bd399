//! In-memory ledger shared by all simulated contracts.

use crate::account::{Account, IssuedAsset};
use crate::transaction::Transaction;
use crate::{LedgerError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One key-value pair of a contract's map store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub contract: u64,
    pub key1: u64,
    pub key2: u64,
    pub value: u64,
}

/// Facts about a deployed contract that other contracts may query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    pub id: u64,
    pub activation_amount: u64,
    pub code_hash: u64,
}

/// Accounts, transactions, assets and maps at the current block height.
#[derive(Debug, Clone)]
pub struct Blockchain {
    current_block: u64,
    block_sequence: u64,
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    assets: Vec<IssuedAsset>,
    maps: Vec<MapEntry>,
    contracts: Vec<ContractRecord>,
    rng: StdRng,
}

impl Blockchain {
    pub fn new(start_block: u64, seed: u64) -> Self {
        Self {
            current_block: start_block,
            block_sequence: 1,
            accounts: Vec::new(),
            transactions: Vec::new(),
            assets: Vec::new(),
            maps: Vec::new(),
            contracts: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn current_block(&self) -> u64 {
        self.current_block
    }

    /// Moves to the next block and restarts the intra-block sequence.
    pub fn advance_block(&mut self) {
        self.current_block += 1;
        self.block_sequence = 1;
        debug!(height = self.current_block, "advanced block height");
    }

    /// Timestamp for the next transaction of the current block.
    pub fn next_timestamp(&mut self) -> u64 {
        let timestamp = (self.current_block << 32) | (self.block_sequence & 0xffff_ffff);
        self.block_sequence += 1;
        timestamp
    }

    /// Draws a non-zero id unused by any account, transaction or asset.
    pub fn fresh_id(&mut self) -> u64 {
        loop {
            let candidate: u64 = self.rng.gen();
            if candidate == 0 || candidate == u64::MAX {
                continue;
            }
            let taken = self.accounts.iter().any(|account| account.id == candidate)
                || self.transactions.iter().any(|tx| tx.id == candidate)
                || self.assets.iter().any(|asset| asset.id == candidate);
            if !taken {
                return candidate;
            }
        }
    }

    // ---- accounts ----

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, id: u64) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == id)
    }

    pub fn has_account(&self, id: u64) -> bool {
        self.account(id).is_some()
    }

    /// Returns the account, creating an empty one on first reference.
    pub fn account_mut(&mut self, id: u64) -> &mut Account {
        let index = match self.accounts.iter().position(|account| account.id == id) {
            Some(index) => index,
            None => {
                self.accounts.push(Account::new(id));
                self.accounts.len() - 1
            }
        };
        &mut self.accounts[index]
    }

    pub fn balance(&self, id: u64) -> u64 {
        self.account(id).map(|account| account.balance).unwrap_or(0)
    }

    pub fn credit(&mut self, id: u64, amount: u64) -> Result<()> {
        let account = self.account_mut(id);
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(id))?;
        Ok(())
    }

    /// Checks that a batch of `(recipient, amount)` credits can all be applied
    /// on top of the current balances without overflowing any account.
    pub fn check_credits(&self, credits: impl IntoIterator<Item = (u64, u64)>) -> Result<()> {
        let mut totals: BTreeMap<u64, u64> = BTreeMap::new();
        for (recipient, amount) in credits {
            let total = match totals.get(&recipient) {
                Some(total) => *total,
                None => self.balance(recipient),
            };
            let total = total
                .checked_add(amount)
                .ok_or(LedgerError::BalanceOverflow(recipient))?;
            totals.insert(recipient, total);
        }
        Ok(())
    }

    pub fn debit(&mut self, id: u64, amount: u64) -> Result<()> {
        let account = self.account_mut(id);
        if account.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: id,
                requested: amount,
                available: account.balance,
            });
        }
        account.balance -= amount;
        Ok(())
    }

    // ---- transactions ----

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn find_transaction(&self, id: u64) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    pub fn transactions_to(&self, recipient: u64) -> impl Iterator<Item = &Transaction> + '_ {
        self.transactions
            .iter()
            .filter(move |tx| tx.recipient == recipient)
    }

    /// Credits the recipient and records the transaction with a fresh id and
    /// timestamp in the current block. Returns the new id.
    pub fn apply_transaction(&mut self, mut tx: Transaction) -> Result<u64> {
        self.credit(tx.recipient, tx.amount)?;
        let recipient = self.account_mut(tx.recipient);
        for token in &tx.tokens {
            recipient.credit_asset(token.asset, token.quantity);
        }
        tx.id = self.fresh_id();
        tx.timestamp = self.next_timestamp();
        tx.blockheight = self.current_block;
        let id = tx.id;
        debug!(
            id,
            sender = tx.sender,
            recipient = tx.recipient,
            amount = tx.amount,
            "transaction applied"
        );
        self.transactions.push(tx);
        Ok(id)
    }

    /// Oldest transaction to `recipient` with a timestamp after `timestamp`
    /// and an amount of at least `min_amount`.
    pub fn transaction_after(
        &self,
        recipient: u64,
        timestamp: u64,
        min_amount: u64,
    ) -> Option<&Transaction> {
        self.transactions_to(recipient)
            .filter(|tx| tx.timestamp > timestamp && tx.amount >= min_amount)
            .min_by_key(|tx| tx.timestamp)
    }

    /// Marks the first unprocessed transaction to `recipient` carrying at
    /// least `min_amount` as processed. Returns its id when one was found.
    pub fn consume_activation(&mut self, recipient: u64, min_amount: u64) -> Option<u64> {
        let tx = self
            .transactions
            .iter_mut()
            .filter(|tx| tx.recipient == recipient && !tx.processed && tx.amount >= min_amount)
            .min_by_key(|tx| tx.timestamp)?;
        tx.processed = true;
        Some(tx.id)
    }

    // ---- maps ----

    pub fn maps(&self) -> &[MapEntry] {
        &self.maps
    }

    pub fn map_value(&self, contract: u64, key1: u64, key2: u64) -> u64 {
        self.maps
            .iter()
            .find(|entry| entry.contract == contract && entry.key1 == key1 && entry.key2 == key2)
            .map(|entry| entry.value)
            .unwrap_or(0)
    }

    pub fn set_map_value(&mut self, contract: u64, key1: u64, key2: u64, value: u64) {
        match self
            .maps
            .iter_mut()
            .find(|entry| entry.contract == contract && entry.key1 == key1 && entry.key2 == key2)
        {
            Some(entry) => entry.value = value,
            None => self.maps.push(MapEntry {
                contract,
                key1,
                key2,
                value,
            }),
        }
    }

    // ---- assets ----

    pub fn assets(&self) -> &[IssuedAsset] {
        &self.assets
    }

    pub fn asset(&self, id: u64) -> Option<&IssuedAsset> {
        self.assets.iter().find(|asset| asset.id == id)
    }

    pub fn issue_asset(&mut self, issuer: u64, name: [u64; 2], decimals: u64) -> u64 {
        let id = self.fresh_id();
        self.assets.push(IssuedAsset {
            id,
            issuer,
            name,
            decimals,
        });
        debug!(id, issuer, "asset issued");
        id
    }

    /// Credits newly minted units of an asset to its issuer.
    pub fn mint_asset(&mut self, issuer: u64, asset: u64, quantity: u64) -> Result<()> {
        match self.asset(asset) {
            Some(issued) if issued.issuer == issuer => {
                self.account_mut(issuer).credit_asset(asset, quantity);
                Ok(())
            }
            _ => Err(LedgerError::AssetNotFound(asset)),
        }
    }

    /// Accounts other than `exclude` holding at least `min_quantity` (and at
    /// least one unit) of `asset`, sorted by quantity then id, ascending.
    pub fn asset_holders(&self, asset: u64, min_quantity: u64, exclude: u64) -> Vec<(u64, u64)> {
        let mut holders: Vec<(u64, u64)> = self
            .accounts
            .iter()
            .filter(|account| account.id != exclude)
            .map(|account| (account.id, account.asset_quantity(asset)))
            .filter(|(_, quantity)| *quantity > 0 && *quantity >= min_quantity)
            .collect();
        holders.sort_by_key(|(id, quantity)| (*quantity, *id));
        holders
    }

    /// Units of `asset` held outside the issuer's own account.
    pub fn asset_circulating(&self, asset: u64) -> u64 {
        let issuer = self.asset(asset).map(|issued| issued.issuer);
        self.accounts
            .iter()
            .filter(|account| Some(account.id) != issuer)
            .map(|account| account.asset_quantity(asset))
            .fold(0u64, |acc, quantity| acc.saturating_add(quantity))
    }

    // ---- contracts ----

    pub fn register_contract(&mut self, record: ContractRecord) {
        self.contracts.retain(|existing| existing.id != record.id);
        self.contracts.push(record);
    }

    pub fn contract_record(&self, id: u64) -> Option<&ContractRecord> {
        self.contracts.iter().find(|record| record.id == id)
    }

    pub fn is_contract(&self, id: u64) -> bool {
        self.contract_record(id).is_some()
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(1, 0)
    }
}
