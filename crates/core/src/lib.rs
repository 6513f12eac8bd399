pub mod account;
pub mod blockchain;
pub mod transaction;

pub use account::{Account, AssetQuantity, IssuedAsset};
pub use blockchain::{Blockchain, ContractRecord, MapEntry};
pub use transaction::{Transaction, TransactionType};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance in account {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: u64,
        requested: u64,
        available: u64,
    },

    #[error("Balance overflow in account {0}")]
    BalanceOverflow(u64),

    #[error("Asset {0} not found")]
    AssetNotFound(u64),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
