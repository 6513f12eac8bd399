//! Extended API functions reachable through `FUN`.

use crate::config::ProtocolConfig;
use crate::contract::Contract;
use crate::error::VmResult;
use signum_core::{AssetQuantity, Blockchain, Transaction};
use signum_crypto::{md5_words, ripemd160_words, sha256_bytes_to_word, sha256_words};
use signum_types::{message_to_super_register, super_register_to_message, MINUS_ONE, U256};
use tracing::debug;

/// Operand layout of a `FUN` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// `FUN f`
    F0,
    /// `FUN f $a`
    F1,
    /// `FUN f $a $b`
    F2,
    /// `FUN @r f`
    R0,
    /// `FUN @r f $a $b`
    R2,
}

macro_rules! api_functions {
    ($($variant:ident => $name:literal, $shape:ident;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ApiFunction {
            $($variant,)*
        }

        impl ApiFunction {
            pub const ALL: &'static [ApiFunction] = &[$(ApiFunction::$variant,)*];

            /// Name as written in assembly.
            pub fn name(&self) -> &'static str {
                match self {
                    $(ApiFunction::$variant => $name,)*
                }
            }

            pub fn shape(&self) -> CallShape {
                match self {
                    $(ApiFunction::$variant => CallShape::$shape,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(ApiFunction::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

api_functions! {
    GetA1 => "get_A1", R0;
    GetA2 => "get_A2", R0;
    GetA3 => "get_A3", R0;
    GetA4 => "get_A4", R0;
    GetB1 => "get_B1", R0;
    GetB2 => "get_B2", R0;
    GetB3 => "get_B3", R0;
    GetB4 => "get_B4", R0;
    SetA1 => "set_A1", F1;
    SetA2 => "set_A2", F1;
    SetA3 => "set_A3", F1;
    SetA4 => "set_A4", F1;
    SetA1A2 => "set_A1_A2", F2;
    SetA3A4 => "set_A3_A4", F2;
    SetB1 => "set_B1", F1;
    SetB2 => "set_B2", F1;
    SetB3 => "set_B3", F1;
    SetB4 => "set_B4", F1;
    SetB1B2 => "set_B1_B2", F2;
    SetB3B4 => "set_B3_B4", F2;
    ClearA => "clear_A", F0;
    ClearB => "clear_B", F0;
    ClearAAndB => "clear_A_And_B", F0;
    CopyAFromB => "copy_A_From_B", F0;
    CopyBFromA => "copy_B_From_A", F0;
    SwapAAndB => "swap_A_and_B", F0;
    CheckAIsZero => "check_A_Is_Zero", R0;
    CheckBIsZero => "check_B_Is_Zero", R0;
    CheckAEqualsB => "check_A_equals_B", R0;
    OrAWithB => "OR_A_with_B", F0;
    OrBWithA => "OR_B_with_A", F0;
    AndAWithB => "AND_A_with_B", F0;
    AndBWithA => "AND_B_with_A", F0;
    XorAWithB => "XOR_A_with_B", F0;
    XorBWithA => "XOR_B_with_A", F0;
    AddAToB => "add_A_to_B", F0;
    AddBToA => "add_B_to_A", F0;
    SubAFromB => "sub_A_from_B", F0;
    SubBFromA => "sub_B_from_A", F0;
    MulAByB => "mul_A_by_B", F0;
    MulBByA => "mul_B_by_A", F0;
    DivAByB => "div_A_by_B", F0;
    DivBByA => "div_B_by_A", F0;
    Md5AToB => "MD5_A_to_B", F0;
    CheckMd5AWithB => "check_MD5_A_with_B", R0;
    Hash160AToB => "HASH160_A_to_B", F0;
    CheckHash160AWithB => "check_HASH160_A_with_B", R0;
    Sha256AToB => "SHA256_A_to_B", F0;
    CheckSha256AWithB => "check_SHA256_A_with_B", R0;
    CheckSigBWithA => "Check_Sig_B_With_A", R0;
    GetBlockTimestamp => "get_Block_Timestamp", R0;
    GetCreationTimestamp => "get_Creation_Timestamp", R0;
    GetLastBlockTimestamp => "get_Last_Block_Timestamp", R0;
    PutLastBlockHashInA => "put_Last_Block_Hash_In_A", F0;
    PutLastBlockGSigInA => "put_Last_Block_GSig_In_A", F0;
    AToTxAfterTimestamp => "A_to_Tx_after_Timestamp", F1;
    GetTypeForTxInA => "get_Type_for_Tx_in_A", R0;
    GetAmountForTxInA => "get_Amount_for_Tx_in_A", R0;
    GetTimestampForTxInA => "get_Timestamp_for_Tx_in_A", R0;
    GetTicketIdForTxInA => "get_Ticket_Id_for_Tx_in_A", R0;
    MessageFromTxInAToB => "message_from_Tx_in_A_to_B", F0;
    BToAddressOfTxInA => "B_to_Address_of_Tx_in_A", F0;
    BToAddressOfCreator => "B_to_Address_of_Creator", F0;
    BToAssetsOfTxInA => "B_To_Assets_Of_Tx_In_A", F0;
    GetCurrentBalance => "get_Current_Balance", R0;
    GetPreviousBalance => "get_Previous_Balance", R0;
    SendToAddressInB => "send_to_Address_in_B", F1;
    SendAllToAddressInB => "send_All_to_Address_in_B", F0;
    SendOldToAddressInB => "send_Old_to_Address_in_B", F0;
    SendAToAddressInB => "send_A_to_Address_in_B", F0;
    AddMinutesToTimestamp => "add_Minutes_to_Timestamp", R2;
    IssueAsset => "issue_Asset", R0;
    MintAsset => "mint_Asset", F0;
    DistributeToAssetHolders => "distribute_To_Asset_Holders", F0;
    GetAssetHoldersCount => "get_Asset_Holders_Count", R0;
    GetAssetCirculating => "get_Asset_Circulating", R0;
    GetActivationFee => "get_Activation_Fee", R0;
    GetCodeHashId => "get_Code_Hash_Id", R0;
    GetMapValueKeysInA => "get_Map_Value_Keys_In_A", R0;
    SetMapValueKeysInA => "set_Map_Value_Keys_In_A", F0;
}

/// Result of one API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOutcome {
    /// Finished; the value is stored when the call has a result operand.
    Value(u64),
    /// The call must be repeated once the given block is reached.
    Sleep { until_block: u64 },
}

const DONE: VmResult<ApiOutcome> = Ok(ApiOutcome::Value(0));

/// State an API function may touch.
pub struct ApiContext<'a> {
    pub contract: &'a mut Contract,
    pub chain: &'a mut Blockchain,
    pub config: &'a ProtocolConfig,
}

fn super_register(words: [u64; 4]) -> U256 {
    message_to_super_register(words)
}

fn flag(condition: bool) -> VmResult<ApiOutcome> {
    Ok(ApiOutcome::Value(condition as u64))
}

/// Splits `amount` pro rata over `quantities`. The last share absorbs the
/// rounding remainder.
pub fn pro_rata_shares(amount: u64, quantities: &[u64]) -> Vec<u64> {
    let total: u128 = quantities.iter().map(|&q| q as u128).sum();
    if total == 0 || quantities.is_empty() {
        return vec![0; quantities.len()];
    }
    let mut shares = Vec::with_capacity(quantities.len());
    let mut assigned = 0u64;
    for &quantity in &quantities[..quantities.len() - 1] {
        let share = (amount as u128 * quantity as u128 / total) as u64;
        assigned += share;
        shares.push(share);
    }
    shares.push(amount - assigned);
    shares
}

impl ApiContext<'_> {
    pub fn call(&mut self, function: ApiFunction, args: [u64; 2]) -> VmResult<ApiOutcome> {
        use ApiFunction::*;

        let [arg1, arg2] = args;
        let height = self.chain.current_block();
        let contract = &mut *self.contract;

        match function {
            GetA1 | GetA2 | GetA3 | GetA4 => {
                Ok(ApiOutcome::Value(contract.a[register_lane(function)]))
            }
            GetB1 | GetB2 | GetB3 | GetB4 => {
                Ok(ApiOutcome::Value(contract.b[register_lane(function)]))
            }
            SetA1 | SetA2 | SetA3 | SetA4 => {
                contract.a[register_lane(function)] = arg1;
                DONE
            }
            SetB1 | SetB2 | SetB3 | SetB4 => {
                contract.b[register_lane(function)] = arg1;
                DONE
            }
            SetA1A2 => {
                contract.a[0] = arg1;
                contract.a[1] = arg2;
                DONE
            }
            SetA3A4 => {
                contract.a[2] = arg1;
                contract.a[3] = arg2;
                DONE
            }
            SetB1B2 => {
                contract.b[0] = arg1;
                contract.b[1] = arg2;
                DONE
            }
            SetB3B4 => {
                contract.b[2] = arg1;
                contract.b[3] = arg2;
                DONE
            }
            ClearA => {
                contract.a = [0; 4];
                DONE
            }
            ClearB => {
                contract.b = [0; 4];
                DONE
            }
            ClearAAndB => {
                contract.a = [0; 4];
                contract.b = [0; 4];
                DONE
            }
            CopyAFromB => {
                contract.a = contract.b;
                DONE
            }
            CopyBFromA => {
                contract.b = contract.a;
                DONE
            }
            SwapAAndB => {
                std::mem::swap(&mut contract.a, &mut contract.b);
                DONE
            }
            CheckAIsZero => flag(contract.a == [0; 4]),
            CheckBIsZero => flag(contract.b == [0; 4]),
            CheckAEqualsB => flag(contract.a == contract.b),

            OrAWithB | OrBWithA | AndAWithB | AndBWithA | XorAWithB | XorBWithA => {
                let (a, b) = (contract.a, contract.b);
                let combine = |x: u64, y: u64| match function {
                    OrAWithB | OrBWithA => x | y,
                    AndAWithB | AndBWithA => x & y,
                    _ => x ^ y,
                };
                let mut out = [0u64; 4];
                for lane in 0..4 {
                    out[lane] = combine(a[lane], b[lane]);
                }
                if matches!(function, OrAWithB | AndAWithB | XorAWithB) {
                    contract.a = out;
                } else {
                    contract.b = out;
                }
                DONE
            }

            AddAToB | AddBToA | SubAFromB | SubBFromA | MulAByB | MulBByA | DivAByB | DivBByA => {
                let a = super_register(contract.a);
                let b = super_register(contract.b);
                match function {
                    AddAToB => contract.b = super_register_to_message(b.overflowing_add(a).0),
                    AddBToA => contract.a = super_register_to_message(a.overflowing_add(b).0),
                    SubAFromB => contract.b = super_register_to_message(b.overflowing_sub(a).0),
                    SubBFromA => contract.a = super_register_to_message(a.overflowing_sub(b).0),
                    MulAByB => contract.b = super_register_to_message(a.overflowing_mul(b).0),
                    MulBByA => contract.a = super_register_to_message(a.overflowing_mul(b).0),
                    DivAByB if !b.is_zero() => contract.b = super_register_to_message(a / b),
                    DivBByA if !a.is_zero() => contract.a = super_register_to_message(b / a),
                    _ => {}
                }
                DONE
            }

            Md5AToB => {
                let digest = md5_words(&[contract.a[0], contract.a[1]]);
                contract.b[..2].copy_from_slice(&digest);
                DONE
            }
            CheckMd5AWithB => {
                let digest = md5_words(&[contract.a[0], contract.a[1]]);
                flag(digest[..] == contract.b[..2])
            }
            Hash160AToB => {
                let digest = ripemd160_words(&contract.a);
                contract.b[..3].copy_from_slice(&digest);
                DONE
            }
            CheckHash160AWithB => {
                let digest = ripemd160_words(&contract.a);
                flag(
                    digest[0] == contract.b[0]
                        && digest[1] == contract.b[1]
                        && digest[2] & 0xffff_ffff == contract.b[2] & 0xffff_ffff,
                )
            }
            Sha256AToB => {
                contract.b = sha256_words(&contract.a);
                DONE
            }
            CheckSha256AWithB => flag(sha256_words(&contract.a) == contract.b),
            CheckSigBWithA => Ok(ApiOutcome::Value(0)),

            GetBlockTimestamp => Ok(ApiOutcome::Value(height << 32)),
            GetCreationTimestamp => Ok(ApiOutcome::Value(contract.creation_block << 32)),
            GetLastBlockTimestamp => Ok(ApiOutcome::Value(height.saturating_sub(1) << 32)),
            PutLastBlockHashInA => {
                contract.a = last_block_hash(height);
                DONE
            }
            PutLastBlockGSigInA => {
                contract.a = sha256_words(&last_block_hash(height));
                DONE
            }

            AToTxAfterTimestamp => {
                let found = self
                    .chain
                    .transaction_after(contract.id, arg1, contract.activation_amount)
                    .map(|tx| tx.id)
                    .unwrap_or(0);
                contract.a = [found, 0, 0, 0];
                DONE
            }
            GetTypeForTxInA => Ok(ApiOutcome::Value(
                incoming_tx(self.chain, contract)
                    .map(|tx| tx.tx_type.code())
                    .unwrap_or(MINUS_ONE),
            )),
            GetAmountForTxInA => {
                let asset = contract.a[3];
                Ok(ApiOutcome::Value(
                    incoming_tx(self.chain, contract)
                        .map(|tx| {
                            if asset == 0 {
                                tx.amount
                            } else {
                                tx.token_quantity(asset)
                            }
                        })
                        .unwrap_or(MINUS_ONE),
                ))
            }
            GetTimestampForTxInA => Ok(ApiOutcome::Value(
                incoming_tx(self.chain, contract)
                    .map(|tx| tx.timestamp)
                    .unwrap_or(MINUS_ONE),
            )),
            GetTicketIdForTxInA => {
                let Some(tx) = incoming_tx(self.chain, contract) else {
                    return Ok(ApiOutcome::Value(MINUS_ONE));
                };
                let matures_at = tx.blockheight.saturating_add(self.config.random_sleep_blocks);
                if height < matures_at {
                    debug!(contract = contract.id, tx = tx.id, matures_at, "ticket not mature");
                    return Ok(ApiOutcome::Sleep {
                        until_block: matures_at,
                    });
                }
                let mut seed = Vec::with_capacity(24);
                seed.extend_from_slice(&tx.id.to_le_bytes());
                seed.extend_from_slice(&tx.blockheight.to_le_bytes());
                seed.extend_from_slice(&contract.id.to_le_bytes());
                Ok(ApiOutcome::Value(sha256_bytes_to_word(&seed)))
            }
            MessageFromTxInAToB => {
                let page = contract.a[1];
                contract.b = incoming_tx(self.chain, contract)
                    .map(|tx| tx.message_page(page))
                    .unwrap_or([0; 4]);
                DONE
            }
            BToAddressOfTxInA => {
                let sender = incoming_tx(self.chain, contract)
                    .map(|tx| tx.sender)
                    .unwrap_or(0);
                contract.b = [sender, 0, 0, 0];
                DONE
            }
            BToAddressOfCreator => {
                contract.b = [contract.creator, 0, 0, 0];
                DONE
            }
            BToAssetsOfTxInA => {
                let mut assets = [0u64; 4];
                if let Some(tx) = incoming_tx(self.chain, contract) {
                    for (slot, token) in assets.iter_mut().zip(&tx.tokens) {
                        *slot = token.asset;
                    }
                }
                contract.b = assets;
                DONE
            }

            GetCurrentBalance => Ok(ApiOutcome::Value(self.chain.balance(contract.id))),
            GetPreviousBalance => Ok(ApiOutcome::Value(contract.previous_balance)),
            SendToAddressInB => {
                let recipient = contract.b[0];
                let asset = contract.b[1];
                if asset == 0 {
                    let amount = arg1.min(self.chain.balance(contract.id));
                    self.send(recipient, amount, None, None)
                } else {
                    let signa = contract.b[2].min(self.chain.balance(contract.id));
                    let quantity = self.chain.account_mut(contract.id).debit_asset(asset, arg1);
                    self.send(recipient, signa, Some(AssetQuantity { asset, quantity }), None)
                }
            }
            SendAllToAddressInB => {
                let recipient = contract.b[0];
                let amount = self.chain.balance(contract.id);
                self.send(recipient, amount, None, None)
            }
            SendOldToAddressInB => {
                let recipient = contract.b[0];
                let amount = contract.previous_balance.min(self.chain.balance(contract.id));
                self.send(recipient, amount, None, None)
            }
            SendAToAddressInB => {
                let (recipient, page) = (contract.b[0], contract.a);
                self.send(recipient, 0, None, Some(page))
            }

            AddMinutesToTimestamp => {
                let blocks = arg2.checked_div(self.config.block_time_minutes).unwrap_or(0);
                Ok(ApiOutcome::Value(arg1.wrapping_add(blocks << 32)))
            }

            IssueAsset => {
                let id = self
                    .chain
                    .issue_asset(contract.id, [contract.a[0], contract.a[1]], contract.a[2]);
                contract.issued_assets.push(id);
                Ok(ApiOutcome::Value(id))
            }
            MintAsset => {
                if let Err(err) = self.chain.mint_asset(contract.id, contract.b[1], contract.b[0]) {
                    debug!(contract = contract.id, %err, "mint ignored");
                }
                DONE
            }
            DistributeToAssetHolders => self.distribute(),
            GetAssetHoldersCount => Ok(ApiOutcome::Value(
                self.chain
                    .asset_holders(contract.b[1], contract.b[0], contract.id)
                    .len() as u64,
            )),
            GetAssetCirculating => Ok(ApiOutcome::Value(self.chain.asset_circulating(contract.b[1]))),
            GetActivationFee => {
                let target = contract.b[0];
                let fee = if target == 0 || target == contract.id {
                    contract.activation_amount
                } else {
                    self.chain
                        .contract_record(target)
                        .map(|record| record.activation_amount)
                        .unwrap_or(0)
                };
                Ok(ApiOutcome::Value(fee))
            }
            GetCodeHashId => {
                let target = if contract.b[0] == 0 {
                    contract.id
                } else {
                    contract.b[0]
                };
                Ok(ApiOutcome::Value(
                    self.chain
                        .contract_record(target)
                        .map(|record| record.code_hash)
                        .unwrap_or(0),
                ))
            }
            GetMapValueKeysInA => {
                let owner = if contract.a[2] == 0 {
                    contract.id
                } else {
                    contract.a[2]
                };
                Ok(ApiOutcome::Value(
                    self.chain.map_value(owner, contract.a[0], contract.a[1]),
                ))
            }
            SetMapValueKeysInA => {
                self.chain
                    .set_map_value(contract.id, contract.a[0], contract.a[1], contract.a[3]);
                DONE
            }
        }
    }

    /// Debits the contract now and queues the credit for the next forge.
    fn send(
        &mut self,
        recipient: u64,
        amount: u64,
        token: Option<AssetQuantity>,
        message: Option<[u64; 4]>,
    ) -> VmResult<ApiOutcome> {
        let has_token = token.map_or(false, |t| t.quantity > 0);
        if amount == 0 && !has_token && message.is_none() {
            return DONE;
        }
        self.chain.debit(self.contract.id, amount)?;
        let height = self.chain.current_block();
        self.contract
            .enqueue(recipient, amount, token, message, height);
        debug!(contract = self.contract.id, recipient, amount, "payment enqueued");
        DONE
    }

    fn distribute(&mut self) -> VmResult<ApiOutcome> {
        let id = self.contract.id;
        let [min_quantity, holder_asset, _, _] = self.contract.b;
        let [signa_requested, _, token_asset, token_requested] = self.contract.a;

        let holders = self.chain.asset_holders(holder_asset, min_quantity, id);
        if holders.is_empty() {
            return DONE;
        }
        let quantities: Vec<u64> = holders.iter().map(|&(_, quantity)| quantity).collect();

        let signa = signa_requested.min(self.chain.balance(id));
        let tokens = if token_asset == 0 {
            0
        } else {
            self.chain
                .account_mut(id)
                .debit_asset(token_asset, token_requested)
        };
        self.chain.debit(id, signa)?;

        let signa_shares = pro_rata_shares(signa, &quantities);
        let token_shares = pro_rata_shares(tokens, &quantities);
        let height = self.chain.current_block();
        for (((holder, _), signa_share), token_share) in
            holders.iter().zip(signa_shares).zip(token_shares)
        {
            if signa_share == 0 && token_share == 0 {
                continue;
            }
            let token = (token_share > 0).then_some(AssetQuantity {
                asset: token_asset,
                quantity: token_share,
            });
            self.contract
                .enqueue(*holder, signa_share, token, None, height);
        }
        debug!(contract = id, holders = holders.len(), signa, tokens, "distributed to holders");
        DONE
    }
}

fn register_lane(function: ApiFunction) -> usize {
    use ApiFunction::*;
    match function {
        GetA1 | GetB1 | SetA1 | SetB1 => 0,
        GetA2 | GetB2 | SetA2 | SetB2 => 1,
        GetA3 | GetB3 | SetA3 | SetB3 => 2,
        _ => 3,
    }
}

/// Transaction named by A1, only if it was sent to this contract.
fn incoming_tx<'c>(chain: &'c Blockchain, contract: &Contract) -> Option<&'c Transaction> {
    chain
        .find_transaction(contract.a[0])
        .filter(|tx| tx.recipient == contract.id)
}

fn last_block_hash(height: u64) -> [u64; 4] {
    sha256_words(&[height.saturating_sub(1), 0, 0, 0])
}
