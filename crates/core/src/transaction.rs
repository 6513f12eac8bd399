use crate::account::AssetQuantity;
use serde::{Deserialize, Serialize};
use signum_types::MESSAGE_PAGE_WORDS;

/// Transaction kind as reported by `get_Type_for_Tx_in_A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Payment,
    Message,
    AssetTransfer,
}

impl TransactionType {
    pub const fn code(&self) -> u64 {
        match self {
            TransactionType::Payment => 0,
            TransactionType::Message => 1,
            TransactionType::AssetTransfer => 2,
        }
    }

    /// Derives the kind from the payload a transaction carries.
    pub fn classify(tokens: &[AssetQuantity], message: &[u64]) -> Self {
        if !tokens.is_empty() {
            TransactionType::AssetTransfer
        } else if !message.is_empty() {
            TransactionType::Message
        } else {
            TransactionType::Payment
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: u64,
    pub sender: u64,
    pub recipient: u64,
    pub amount: u64,
    pub tokens: Vec<AssetQuantity>,
    /// Message payload in whole four-word pages; empty when absent.
    pub message: Vec<u64>,
    pub blockheight: u64,
    /// `blockheight << 32 | sequence within the block`.
    pub timestamp: u64,
    /// Set once the transaction has been used to activate its recipient.
    pub processed: bool,
    pub tx_type: TransactionType,
}

impl Transaction {
    /// Builds an unconfirmed transaction; id and timestamp are assigned on append.
    pub fn new(
        sender: u64,
        recipient: u64,
        amount: u64,
        tokens: Vec<AssetQuantity>,
        message: Vec<u64>,
        blockheight: u64,
    ) -> Self {
        let tx_type = TransactionType::classify(&tokens, &message);
        Self {
            id: 0,
            sender,
            recipient,
            amount,
            tokens,
            message,
            blockheight,
            timestamp: 0,
            processed: false,
            tx_type,
        }
    }

    /// Returns one four-word message page, zero-filled past the payload.
    pub fn message_page(&self, page: u64) -> [u64; 4] {
        let mut out = [0u64; 4];
        let Ok(page) = usize::try_from(page) else {
            return out;
        };
        let start = page.saturating_mul(MESSAGE_PAGE_WORDS);
        for (slot, word) in out.iter_mut().zip(self.message.iter().skip(start)) {
            *slot = *word;
        }
        out
    }

    pub fn token_quantity(&self, asset: u64) -> u64 {
        self.tokens
            .iter()
            .filter(|token| token.asset == asset)
            .map(|token| token.quantity)
            .fold(0u64, |acc, quantity| acc.saturating_add(quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            Transaction::new(1, 2, 10, vec![], vec![], 1).tx_type,
            TransactionType::Payment
        );
        assert_eq!(
            Transaction::new(1, 2, 10, vec![], vec![1, 0, 0, 0], 1).tx_type,
            TransactionType::Message
        );
        let tokens = vec![AssetQuantity { asset: 5, quantity: 3 }];
        let tx = Transaction::new(1, 2, 0, tokens, vec![], 1);
        assert_eq!(tx.tx_type, TransactionType::AssetTransfer);
        assert_eq!(tx.tx_type.code(), 2);
        assert_eq!(tx.token_quantity(5), 3);
        assert_eq!(tx.token_quantity(6), 0);
    }

    #[test]
    fn test_message_pages() {
        let tx = Transaction::new(1, 2, 0, vec![], vec![1, 2, 3, 4, 5, 6, 7, 8], 1);
        assert_eq!(tx.message_page(0), [1, 2, 3, 4]);
        assert_eq!(tx.message_page(1), [5, 6, 7, 8]);
        assert_eq!(tx.message_page(2), [0, 0, 0, 0]);
        assert_eq!(tx.message_page(u64::MAX), [0, 0, 0, 0]);
    }
}
