//! P2WPKH transaction engine.
//!
//! Plans single-input native SegWit (bech32, witness v0) payments from a set
//! of UTXOs, splitting across several transactions when no single output
//! covers the amount and steering clear of dust outputs. Plans are then
//! hashed per BIP143, signed with low-S ECDSA and serialized per BIP144.
//!
//! Everything here is synchronous and free of I/O; fetching UTXOs and
//! broadcasting belong to the caller.

pub mod address;
pub mod error;
pub mod keys;
pub mod network;
pub mod planner;
pub mod sighash;
pub mod signer;
pub mod transaction;
pub mod types;
pub mod units;

pub use error::BtcError;
pub use keys::KeyRing;
pub use network::BtcNetwork;
pub use planner::plan_payment;
pub use signer::{sign_p2wpkh, sign_plan, WitnessStack};
pub use types::{
    FeePolicy, SignedTransaction, TransactionInput, TransactionOutput, TransactionPlan,
    UnspentOutput, DUST_SATS, FEE_SATS,
};

/// Plan a payment and sign every resulting transaction.
///
/// Returns the signed transactions in broadcast order.
pub fn build_signed_payment(
    utxos: Vec<UnspentOutput>,
    amount_sats: u64,
    recipient: &str,
    change_address: &str,
    keys: &KeyRing,
    policy: &FeePolicy,
    network: BtcNetwork,
) -> Result<Vec<SignedTransaction>, BtcError> {
    let plans = plan_payment(utxos, amount_sats, recipient, change_address, policy, network)?;
    plans
        .iter()
        .map(|plan| sign_plan(plan, keys, network))
        .collect()
}
