use serde::{Deserialize, Serialize};

/// Quantity of one asset held by an account or attached to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuantity {
    pub asset: u64,
    pub quantity: u64,
}

/// Ledger account: Signa balance plus asset holdings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub balance: u64,
    pub assets: Vec<AssetQuantity>,
}

impl Account {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn asset_quantity(&self, asset: u64) -> u64 {
        self.assets
            .iter()
            .find(|holding| holding.asset == asset)
            .map(|holding| holding.quantity)
            .unwrap_or(0)
    }

    pub fn credit_asset(&mut self, asset: u64, quantity: u64) {
        if quantity == 0 {
            return;
        }
        match self.assets.iter_mut().find(|holding| holding.asset == asset) {
            Some(holding) => holding.quantity = holding.quantity.saturating_add(quantity),
            None => self.assets.push(AssetQuantity { asset, quantity }),
        }
    }

    /// Removes up to `quantity` units of `asset`, returning what was removed.
    pub fn debit_asset(&mut self, asset: u64, quantity: u64) -> u64 {
        match self.assets.iter_mut().find(|holding| holding.asset == asset) {
            Some(holding) => {
                let taken = quantity.min(holding.quantity);
                holding.quantity -= taken;
                taken
            }
            None => 0,
        }
    }
}

/// Asset issued by a contract through `issue_Asset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedAsset {
    pub id: u64,
    pub issuer: u64,
    pub name: [u64; 2],
    pub decimals: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_credit_and_debit() {
        let mut account = Account::new(7);
        account.credit_asset(100, 50);
        account.credit_asset(100, 25);
        account.credit_asset(200, 0);
        assert_eq!(account.asset_quantity(100), 75);
        assert_eq!(account.assets.len(), 1);

        assert_eq!(account.debit_asset(100, 80), 75);
        assert_eq!(account.asset_quantity(100), 0);
        assert_eq!(account.debit_asset(300, 1), 0);
    }
}
