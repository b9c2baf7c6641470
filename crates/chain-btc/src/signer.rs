use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::address;
use crate::error::BtcError;
use crate::keys::KeyRing;
use crate::network::BtcNetwork;
use crate::sighash::{self, SIGHASH_ALL};
use crate::transaction::{write_compact_size, UnsignedSegwitTx};
use crate::types::{SignedTransaction, TransactionPlan};

/// The witness of one input: a list of byte strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessStack {
    items: Vec<Vec<u8>>,
}

impl WitnessStack {
    pub fn new(items: Vec<Vec<u8>>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Vec<u8>] {
        &self.items
    }

    /// `compact_size(count) || (compact_size(len) || item)*`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + self.items.iter().map(|i| i.len() + 1).sum::<usize>());
        write_compact_size(&mut buf, self.items.len() as u64);
        for item in &self.items {
            write_compact_size(&mut buf, item.len() as u64);
            buf.extend_from_slice(item);
        }
        buf
    }
}

/// Parse a 32-byte secp256k1 scalar.
pub fn signing_key(private_key: &[u8; 32]) -> Result<SigningKey, BtcError> {
    SigningKey::from_bytes(private_key.into())
        .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid secp256k1 key: {e}")))
}

/// Compressed SEC1 public key of a signing key.
pub fn compressed_public_key(key: &SigningKey) -> Result<[u8; 33], BtcError> {
    key.verifying_key()
        .to_encoded_point(true)
        .as_bytes()
        .try_into()
        .map_err(|_| BtcError::SigningError("invalid public key encoding".into()))
}

/// Sign a sighash and build the P2WPKH witness `[DER(sig) || 0x01, pubkey]`.
///
/// Nonces are RFC 6979 deterministic. The signature is normalized to low-S
/// before DER encoding.
pub fn sign_p2wpkh(sighash: &[u8; 32], private_key: &[u8; 32]) -> Result<WitnessStack, BtcError> {
    let key = signing_key(private_key)?;
    sign_with_key(sighash, &key)
}

fn sign_with_key(sighash: &[u8; 32], key: &SigningKey) -> Result<WitnessStack, BtcError> {
    let sig: Signature = key
        .sign_prehash(sighash)
        .map_err(|e| BtcError::SigningError(format!("ECDSA signing failed: {e}")))?;
    let sig = sig.normalize_s().unwrap_or(sig);

    let mut sig_with_hashtype = sig.to_der().as_bytes().to_vec();
    sig_with_hashtype.push(SIGHASH_ALL as u8);

    let pubkey = compressed_public_key(key)?;
    Ok(WitnessStack::new(vec![sig_with_hashtype, pubkey.to_vec()]))
}

/// Hash, sign and serialize one plan.
///
/// The key is looked up by the input's address; it must hash to that
/// address's witness program.
pub fn sign_plan(
    plan: &TransactionPlan,
    keys: &KeyRing,
    network: BtcNetwork,
) -> Result<SignedTransaction, BtcError> {
    let private_key = keys.private_key_for(&plan.input.address).ok_or_else(|| {
        BtcError::MissingPrivateKeyForInput {
            address: plan.input.address.clone(),
        }
    })?;
    let key = signing_key(private_key)?;
    let pubkey = compressed_public_key(&key)?;

    let program = address::p2wpkh_program(&plan.input.address, network)?;
    if address::hash160(&pubkey) != program {
        return Err(BtcError::KeyMismatch {
            address: plan.input.address.clone(),
        });
    }

    let tx = UnsignedSegwitTx::from_plan(plan, network)?;
    let sighash = sighash::signature_hash(&tx, &pubkey);
    let witness = sign_with_key(&sighash, &key)?;

    Ok(SignedTransaction {
        raw_hex: hex::encode(tx.serialize_with_witness(&witness)),
        txid: tx.txid(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{signature::hazmat::PrehashVerifier, VerifyingKey};

    fn privkey_one() -> [u8; 32] {
        let mut key = [0u8; 32];
        key[31] = 1;
        key
    }

    fn verify(witness: &WitnessStack, sighash: &[u8; 32]) -> Signature {
        let items = witness.items();
        let (der, hashtype) = items[0].split_at(items[0].len() - 1);
        assert_eq!(hashtype, &[0x01]);
        let sig = Signature::from_der(der).unwrap();
        let vk = VerifyingKey::from_sec1_bytes(&items[1]).unwrap();
        vk.verify_prehash(sighash, &sig).unwrap();
        sig
    }

    #[test]
    fn witness_encoding() {
        let w = WitnessStack::new(vec![vec![1, 2, 3], vec![4]]);
        assert_eq!(w.to_bytes(), vec![2, 3, 1, 2, 3, 1, 4]);
    }

    #[test]
    fn witness_layout() {
        let witness = sign_p2wpkh(&[0x11; 32], &privkey_one()).unwrap();
        assert_eq!(witness.items().len(), 2);
        assert_eq!(
            hex::encode(&witness.items()[1]),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );

        let bytes = witness.to_bytes();
        let sig_len = witness.items()[0].len();
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[1] as usize, sig_len);
        assert_eq!(bytes[2], 0x30); // DER sequence
        assert_eq!(bytes[1 + sig_len], 0x01);
        assert_eq!(bytes[2 + sig_len], 0x21);
        assert_eq!(bytes.len(), 1 + 1 + sig_len + 1 + 33);
    }

    #[test]
    fn signature_verifies_and_is_low_s() {
        for seed in 1u8..=16 {
            let sighash = [seed; 32];
            let witness = sign_p2wpkh(&sighash, &[seed.wrapping_mul(7) | 1; 32]).unwrap();
            let sig = verify(&witness, &sighash);
            assert!(sig.normalize_s().is_none(), "high-S signature for seed {seed}");
        }
    }

    #[test]
    fn signing_is_deterministic() {
        let a = sign_p2wpkh(&[0x22; 32], &privkey_one()).unwrap();
        let b = sign_p2wpkh(&[0x22; 32], &privkey_one()).unwrap();
        assert_eq!(a, b);
    }

    const OWN: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    fn plan() -> TransactionPlan {
        use crate::types::{TransactionInput, TransactionOutput};
        TransactionPlan {
            input: TransactionInput {
                txid: "4ce6a8b6f9c3a4b0d1e2f30415263748596a7b8c9daebfc0d1e2f30415263748".into(),
                vout: 1,
                value_sats: 100_000,
                address: OWN.into(),
            },
            outputs: vec![
                TransactionOutput {
                    value_sats: 50_000,
                    address: "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq".into(),
                },
                TransactionOutput {
                    value_sats: 40_000,
                    address: OWN.into(),
                },
            ],
            fee_sats: 10_000,
            change_amount_sats: 40_000,
            change_address: OWN.into(),
        }
    }

    #[test]
    fn sign_plan_produces_segwit_hex() {
        let mut keys = KeyRing::new();
        keys.insert(OWN, privkey_one()).unwrap();
        let signed = sign_plan(&plan(), &keys, BtcNetwork::Mainnet).unwrap();

        assert_eq!(
            signed.txid,
            "c7f6c14f64e72dd141e25fe3f00944958ab6847928fa5072e42b04d8bc3d3053"
        );
        // version, marker, flag, one input
        assert!(signed.raw_hex.starts_with("02000000000101"));
        assert!(signed.raw_hex.ends_with("00000000"));
    }

    #[test]
    fn sign_plan_without_key() {
        assert_eq!(
            sign_plan(&plan(), &KeyRing::new(), BtcNetwork::Mainnet).unwrap_err(),
            BtcError::MissingPrivateKeyForInput {
                address: OWN.into()
            }
        );
    }

    #[test]
    fn sign_plan_with_wrong_key() {
        let mut wrong = [0u8; 32];
        wrong[31] = 2;
        let mut keys = KeyRing::new();
        keys.insert(OWN, wrong).unwrap();
        assert_eq!(
            sign_plan(&plan(), &keys, BtcNetwork::Mainnet).unwrap_err(),
            BtcError::KeyMismatch {
                address: OWN.into()
            }
        );
    }

    #[test]
    fn invalid_key_rejected() {
        assert!(matches!(
            sign_p2wpkh(&[0x11; 32], &[0u8; 32]),
            Err(BtcError::InvalidPrivateKey(_))
        ));
        assert!(sign_p2wpkh(&[0x11; 32], &[0xFF; 32]).is_err());
    }
}
