use serde::{Deserialize, Serialize};

/// Fixed fee charged to every planned transaction, in satoshis.
pub const FEE_SATS: u64 = 10_000;

/// Outputs at or below this value are treated as dust.
pub const DUST_SATS: u64 = 546;

/// Fee and dust policy used by the planner.
///
/// The engine does not estimate fee rates; every transaction pays `fee_sats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeePolicy {
    pub fee_sats: u64,
    pub dust_sats: u64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            fee_sats: FEE_SATS,
            dust_sats: DUST_SATS,
        }
    }
}

impl FeePolicy {
    /// `true` when `value` is a non-zero amount not worth spending later.
    pub fn is_dust(&self, value: u64) -> bool {
        value > 0 && value <= self.dust_sats
    }
}

/// An unspent output as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentOutput {
    /// Transaction ID as hex (display order).
    pub txid: String,
    pub vout: u32,
    pub value_sats: u64,
    /// Address that owns the output; used to find the signing key.
    pub address: String,
}

/// The single UTXO consumed by a planned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub txid: String,
    pub vout: u32,
    pub value_sats: u64,
    pub address: String,
}

impl From<UnspentOutput> for TransactionInput {
    fn from(utxo: UnspentOutput) -> Self {
        Self {
            txid: utxo.txid,
            vout: utxo.vout,
            value_sats: utxo.value_sats,
            address: utxo.address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutput {
    pub value_sats: u64,
    pub address: String,
}

/// A single-input transaction ready to be hashed and signed.
///
/// `outputs[0]` pays the recipient. When present, `outputs[1]` returns change
/// to `change_address` and carries `change_amount_sats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPlan {
    pub input: TransactionInput,
    pub outputs: Vec<TransactionOutput>,
    pub fee_sats: u64,
    pub change_amount_sats: u64,
    pub change_address: String,
}

impl TransactionPlan {
    /// Sum of all output values.
    pub fn output_total(&self) -> u64 {
        self.outputs.iter().map(|o| o.value_sats).sum()
    }

    /// Value sent to the recipient by this plan.
    pub fn recipient_amount(&self) -> u64 {
        self.outputs.first().map_or(0, |o| o.value_sats)
    }

    /// Whether the input value is exactly accounted for by outputs and fee.
    pub fn is_balanced(&self) -> bool {
        self.output_total()
            .checked_add(self.fee_sats)
            .is_some_and(|spent| spent == self.input.value_sats)
    }
}

/// A fully signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    /// Segwit serialization, lowercase hex, ready for broadcast.
    pub raw_hex: String,
    /// Display-order txid of the witness-stripped serialization.
    pub txid: String,
}
