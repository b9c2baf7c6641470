use bech32::{segwit, Fe32};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::BtcError;
use crate::network::BtcNetwork;

/// Length of a P2WPKH scriptPubKey: `OP_0 PUSH20 <20 bytes>`.
pub const P2WPKH_SCRIPT_LEN: usize = 22;

/// A decoded SegWit address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub witness_version: u8,
    pub program: Vec<u8>,
}

/// Decode a bech32/bech32m SegWit address and check it belongs to `network`.
///
/// The checksum variant, program length and HRP are all checked; a mismatch
/// in any of them is an `InvalidAddress`.
pub fn decode_segwit_address(
    address: &str,
    network: BtcNetwork,
) -> Result<DecodedAddress, BtcError> {
    let (hrp, version, program) = segwit::decode(address)
        .map_err(|e| BtcError::InvalidAddress(format!("{address}: {e}")))?;

    if hrp.to_lowercase() != network.hrp().to_lowercase() {
        return Err(BtcError::InvalidAddress(format!(
            "{address}: prefix {hrp} does not match {network} ({})",
            network.hrp()
        )));
    }

    Ok(DecodedAddress {
        witness_version: version.to_u8(),
        program,
    })
}

/// Extract the 20-byte key hash from a P2WPKH address.
pub fn p2wpkh_program(address: &str, network: BtcNetwork) -> Result<[u8; 20], BtcError> {
    let decoded = decode_segwit_address(address, network)?;
    if decoded.witness_version != 0 || decoded.program.len() != 20 {
        return Err(BtcError::UnsupportedWitnessVersion {
            version: decoded.witness_version,
            program_len: decoded.program.len(),
        });
    }

    let mut program = [0u8; 20];
    program.copy_from_slice(&decoded.program);
    Ok(program)
}

/// The scriptPubKey paying to `address`. Only P2WPKH is supported.
pub fn script_pubkey_for_address(address: &str, network: BtcNetwork) -> Result<Vec<u8>, BtcError> {
    let program = p2wpkh_program(address, network)?;
    Ok(p2wpkh_script_pubkey(&program))
}

/// Build a P2WPKH scriptPubKey: OP_0 <20-byte key hash>
pub fn p2wpkh_script_pubkey(program: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(P2WPKH_SCRIPT_LEN);
    script.push(0x00); // OP_0
    script.push(0x14); // Push 20 bytes
    script.extend_from_slice(program);
    script
}

/// Encode a 20-byte key hash as a version 0 SegWit address.
pub fn encode_p2wpkh_address(program: &[u8; 20], network: BtcNetwork) -> Result<String, BtcError> {
    segwit::encode(network.hrp(), Fe32::Q, program)
        .map_err(|e| BtcError::InvalidAddress(format!("bech32 encoding failed: {e}")))
}

/// Inverse of [`script_pubkey_for_address`].
pub fn address_from_script_pubkey(script: &[u8], network: BtcNetwork) -> Result<String, BtcError> {
    if script.len() != P2WPKH_SCRIPT_LEN || script[0] != 0x00 || script[1] != 0x14 {
        return Err(BtcError::InvalidAddress(format!(
            "not a P2WPKH script: {}",
            hex::encode(script)
        )));
    }

    let mut program = [0u8; 20];
    program.copy_from_slice(&script[2..]);
    encode_p2wpkh_address(&program, network)
}

/// Compute Hash160 (RIPEMD-160(SHA-256(data))).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// Derive the P2WPKH address of a compressed secp256k1 public key.
pub fn pubkey_to_p2wpkh_address(
    pubkey_bytes: &[u8; 33],
    network: BtcNetwork,
) -> Result<String, BtcError> {
    if pubkey_bytes[0] != 0x02 && pubkey_bytes[0] != 0x03 {
        return Err(BtcError::InvalidPublicKey(
            "compressed key must start with 0x02 or 0x03".into(),
        ));
    }
    k256::PublicKey::from_sec1_bytes(pubkey_bytes)
        .map_err(|e| BtcError::InvalidPublicKey(format!("not a curve point: {e}")))?;

    encode_p2wpkh_address(&hash160(pubkey_bytes), network)
}
