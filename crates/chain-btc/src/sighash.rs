//! BIP143 signature hashing for a single P2WPKH input.

use crate::address;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::transaction::{double_sha256, write_output, UnsignedSegwitTx};
use crate::types::TransactionPlan;

pub const SIGHASH_ALL: u32 = 0x01;

/// The P2PKH-equivalent script code a P2WPKH witness is checked against,
/// with its length prefix: `19 76a914 <hash160(pubkey)> 88ac`.
pub fn p2wpkh_script_code(public_key: &[u8; 33]) -> Vec<u8> {
    let mut script = Vec::with_capacity(26);
    script.push(0x19); // script length
    script.push(0x76); // OP_DUP
    script.push(0xA9); // OP_HASH160
    script.push(0x14); // Push 20 bytes
    script.extend_from_slice(&address::hash160(public_key));
    script.push(0x88); // OP_EQUALVERIFY
    script.push(0xAC); // OP_CHECKSIG
    script
}

/// The BIP143 pre-image for SIGHASH_ALL.
pub fn signature_hash_preimage(tx: &UnsignedSegwitTx, public_key: &[u8; 33]) -> Vec<u8> {
    let outpoint = tx.outpoint();
    let hash_prevouts = double_sha256(&outpoint);
    let hash_sequence = double_sha256(&tx.sequence.to_le_bytes());
    let hash_outputs = {
        let mut data = Vec::new();
        for out in &tx.outputs {
            write_output(&mut data, out);
        }
        double_sha256(&data)
    };

    let mut preimage = Vec::with_capacity(182);
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend_from_slice(&outpoint);
    preimage.extend_from_slice(&p2wpkh_script_code(public_key));
    preimage.extend_from_slice(&tx.amount_sats.to_le_bytes());
    preimage.extend_from_slice(&tx.sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
    preimage
}

/// Double-SHA256 of [`signature_hash_preimage`].
pub fn signature_hash(tx: &UnsignedSegwitTx, public_key: &[u8; 33]) -> [u8; 32] {
    double_sha256(&signature_hash_preimage(tx, public_key))
}

/// Sighash of a plan's only input, signed by `public_key`.
pub fn compute_signature_hash(
    plan: &TransactionPlan,
    public_key: &[u8; 33],
    network: BtcNetwork,
) -> Result<[u8; 32], BtcError> {
    let tx = UnsignedSegwitTx::from_plan(plan, network)?;
    Ok(signature_hash(&tx, public_key))
}
