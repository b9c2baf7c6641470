use sha2::{Digest, Sha256};

use crate::address;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::signer::WitnessStack;
use crate::types::TransactionPlan;

/// Transaction version; BIP68 relative locktimes need version 2.
pub const TX_VERSION: u32 = 2;

/// Enables nLockTime, does not signal RBF.
pub const SEQUENCE: u32 = 0xFFFF_FFFE;

pub const LOCK_TIME: u32 = 0;

const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value_sats: u64,
    pub script_pubkey: Vec<u8>,
}

/// A single-input P2WPKH transaction with resolved scripts, ready for
/// hashing and serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedSegwitTx {
    pub version: u32,
    /// Previous transaction hash (internal byte order).
    pub prev_txid: [u8; 32],
    pub prev_vout: u32,
    /// Value of the output being spent; committed to by the sighash.
    pub amount_sats: u64,
    pub sequence: u32,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl UnsignedSegwitTx {
    /// Resolve a plan into wire-level fields.
    ///
    /// Rejects plans without outputs, plans whose outputs and fee do not add
    /// up to the input value, malformed txids and non-P2WPKH addresses.
    pub fn from_plan(plan: &TransactionPlan, network: BtcNetwork) -> Result<Self, BtcError> {
        if plan.outputs.is_empty() {
            return Err(BtcError::TransactionBuildError("plan has no outputs".into()));
        }
        if !plan.is_balanced() {
            return Err(BtcError::TransactionBuildError(format!(
                "input {} sat != outputs {} sat + fee {} sat",
                plan.input.value_sats,
                plan.output_total(),
                plan.fee_sats
            )));
        }

        let outputs = plan
            .outputs
            .iter()
            .map(|o| {
                Ok(TxOutput {
                    value_sats: o.value_sats,
                    script_pubkey: address::script_pubkey_for_address(&o.address, network)?,
                })
            })
            .collect::<Result<Vec<_>, BtcError>>()?;

        Ok(Self {
            version: TX_VERSION,
            prev_txid: parse_txid(&plan.input.txid)?,
            prev_vout: plan.input.vout,
            amount_sats: plan.input.value_sats,
            sequence: SEQUENCE,
            outputs,
            lock_time: LOCK_TIME,
        })
    }

    /// `prev_txid || prev_vout` as committed to on the wire.
    pub fn outpoint(&self) -> [u8; 36] {
        let mut outpoint = [0u8; 36];
        outpoint[..32].copy_from_slice(&self.prev_txid);
        outpoint[32..].copy_from_slice(&self.prev_vout.to_le_bytes());
        outpoint
    }

    /// Legacy serialization without marker, flag or witness. Hashes to the txid.
    pub fn serialize_without_witness(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(&self.version.to_le_bytes());
        self.write_inputs_and_outputs(&mut buf);
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    /// BIP144 serialization carrying the witness; this is what gets broadcast.
    pub fn serialize_with_witness(&self, witness: &WitnessStack) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.push(SEGWIT_MARKER);
        buf.push(SEGWIT_FLAG);
        self.write_inputs_and_outputs(&mut buf);
        buf.extend_from_slice(&witness.to_bytes());
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    /// Display-order txid.
    pub fn txid(&self) -> String {
        txid_to_hex(&double_sha256(&self.serialize_without_witness()))
    }

    fn write_inputs_and_outputs(&self, buf: &mut Vec<u8>) {
        write_compact_size(buf, 1);
        buf.extend_from_slice(&self.outpoint());
        write_compact_size(buf, 0); // empty scriptSig
        buf.extend_from_slice(&self.sequence.to_le_bytes());

        write_compact_size(buf, self.outputs.len() as u64);
        for out in &self.outputs {
            write_output(buf, out);
        }
    }
}

/// `value LE8 || compact_size(script length) || script`
pub(crate) fn write_output(buf: &mut Vec<u8>, out: &TxOutput) {
    buf.extend_from_slice(&out.value_sats.to_le_bytes());
    write_compact_size(buf, out.script_pubkey.len() as u64);
    buf.extend_from_slice(&out.script_pubkey);
}

/// Parse a hex txid string (big-endian display) to internal byte order (little-endian).
pub fn parse_txid(txid_hex: &str) -> Result<[u8; 32], BtcError> {
    let bytes = hex::decode(txid_hex)
        .map_err(|e| BtcError::TransactionBuildError(format!("invalid txid hex: {e}")))?;
    let mut txid: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
        BtcError::TransactionBuildError(format!("txid must be 32 bytes, got {}", b.len()))
    })?;
    txid.reverse();
    Ok(txid)
}

/// Internal byte order back to display hex.
pub fn txid_to_hex(txid: &[u8; 32]) -> String {
    let mut display = *txid;
    display.reverse();
    hex::encode(display)
}

/// SHA-256 applied twice.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// Write a Bitcoin CompactSize (variable-length integer).
pub fn write_compact_size(buf: &mut Vec<u8>, val: u64) {
    if val < 0xFD {
        buf.push(val as u8);
    } else if val <= 0xFFFF {
        buf.push(0xFD);
        buf.extend_from_slice(&(val as u16).to_le_bytes());
    } else if val <= 0xFFFF_FFFF {
        buf.push(0xFE);
        buf.extend_from_slice(&(val as u32).to_le_bytes());
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&val.to_le_bytes());
    }
}
