//! Cross-checks the engine's wire output against rust-bitcoin.
//!
//! Every signed transaction must decode with `bitcoin::consensus`, hash to the
//! same txid, and carry a signature over the same BIP143 sighash that
//! `SighashCache` computes. libsecp256k1 only accepts low-S signatures, so
//! verifying with it also checks normalization.

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{ecdsa, Message, PublicKey, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Amount, ScriptBuf, Transaction};

use chain_btc::address::script_pubkey_for_address;
use chain_btc::sighash::compute_signature_hash;
use chain_btc::{
    build_signed_payment, plan_payment, sign_plan, BtcNetwork, FeePolicy, KeyRing,
    SignedTransaction, TransactionPlan, UnspentOutput,
};

const RECIPIENT: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

fn scalar(n: u8) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[31] = n;
    key
}

fn key_ring(network: BtcNetwork) -> (KeyRing, String) {
    let mut ring = KeyRing::new();
    let address = ring.insert_derived(scalar(1), network).unwrap();
    (ring, address)
}

fn utxo(n: u8, value_sats: u64, address: &str) -> UnspentOutput {
    UnspentOutput {
        txid: format!("{n:02x}").repeat(32),
        vout: u32::from(n) % 3,
        value_sats,
        address: address.to_string(),
    }
}

fn decode(signed: &SignedTransaction) -> Transaction {
    let raw = hex::decode(&signed.raw_hex).unwrap();
    bitcoin::consensus::deserialize(&raw).unwrap()
}

/// Checks one signed plan against rust-bitcoin.
fn check_against_oracle(plan: &TransactionPlan, signed: &SignedTransaction, network: BtcNetwork) {
    let tx = decode(signed);

    assert_eq!(tx.compute_txid().to_string(), signed.txid);
    assert_eq!(tx.version, bitcoin::transaction::Version::TWO);
    assert_eq!(tx.lock_time, bitcoin::absolute::LockTime::ZERO);

    assert_eq!(tx.input.len(), 1);
    let input = &tx.input[0];
    assert_eq!(input.previous_output.txid.to_string(), plan.input.txid);
    assert_eq!(input.previous_output.vout, plan.input.vout);
    assert_eq!(input.sequence.0, 0xFFFF_FFFE);
    assert!(input.script_sig.is_empty());

    assert_eq!(tx.output.len(), plan.outputs.len());
    for (ours, theirs) in plan.outputs.iter().zip(&tx.output) {
        assert_eq!(theirs.value.to_sat(), ours.value_sats);
        assert_eq!(
            theirs.script_pubkey.as_bytes(),
            script_pubkey_for_address(&ours.address, network).unwrap().as_slice()
        );
    }

    assert_eq!(input.witness.len(), 2);
    let sig_with_type = input.witness.nth(0).unwrap();
    let pubkey_bytes = input.witness.nth(1).unwrap();
    assert_eq!(*sig_with_type.last().unwrap(), EcdsaSighashType::All as u8);

    let script_pubkey =
        ScriptBuf::from_bytes(script_pubkey_for_address(&plan.input.address, network).unwrap());
    let sighash = SighashCache::new(&tx)
        .p2wpkh_signature_hash(
            0,
            &script_pubkey,
            Amount::from_sat(plan.input.value_sats),
            EcdsaSighashType::All,
        )
        .unwrap();

    let pubkey: [u8; 33] = pubkey_bytes.try_into().unwrap();
    let ours = compute_signature_hash(plan, &pubkey, network).unwrap();
    assert_eq!(ours, sighash.to_byte_array());

    let secp = Secp256k1::verification_only();
    let sig = ecdsa::Signature::from_der(&sig_with_type[..sig_with_type.len() - 1]).unwrap();
    let msg = Message::from_digest(sighash.to_byte_array());
    let pk = PublicKey::from_slice(pubkey_bytes).unwrap();
    secp.verify_ecdsa(&msg, &sig, &pk).unwrap();
}

#[test]
fn single_plan_matches_rust_bitcoin() {
    let network = BtcNetwork::Mainnet;
    let (ring, own) = key_ring(network);
    let plans = plan_payment(
        vec![utxo(7, 100_000, &own)],
        50_000,
        RECIPIENT,
        &own,
        &FeePolicy::default(),
        network,
    )
    .unwrap();
    assert_eq!(plans.len(), 1);

    let signed = sign_plan(&plans[0], &ring, network).unwrap();
    check_against_oracle(&plans[0], &signed, network);
}

#[test]
fn known_transaction_txid() {
    let network = BtcNetwork::Mainnet;
    let (ring, own) = key_ring(network);
    let plan = TransactionPlan {
        input: chain_btc::TransactionInput {
            txid: "4ce6a8b6f9c3a4b0d1e2f30415263748596a7b8c9daebfc0d1e2f30415263748".into(),
            vout: 1,
            value_sats: 100_000,
            address: own.clone(),
        },
        outputs: vec![
            chain_btc::TransactionOutput {
                value_sats: 50_000,
                address: RECIPIENT.into(),
            },
            chain_btc::TransactionOutput {
                value_sats: 40_000,
                address: own.clone(),
            },
        ],
        fee_sats: 10_000,
        change_amount_sats: 40_000,
        change_address: own,
    };

    let signed = sign_plan(&plan, &ring, network).unwrap();
    assert_eq!(
        signed.txid,
        "c7f6c14f64e72dd141e25fe3f00944958ab6847928fa5072e42b04d8bc3d3053"
    );
    check_against_oracle(&plan, &signed, network);

    // Resigning yields the same bytes.
    assert_eq!(sign_plan(&plan, &ring, network).unwrap(), signed);
}

#[test]
fn split_payment_matches_rust_bitcoin() {
    let network = BtcNetwork::Mainnet;
    let (ring, own) = key_ring(network);
    let utxos = vec![
        utxo(1, 50_000, &own),
        utxo(2, 60_000, &own),
        utxo(3, 100_000, &own),
    ];
    let policy = FeePolicy::default();

    let plans = plan_payment(utxos.clone(), 100_000, RECIPIENT, &own, &policy, network).unwrap();
    let signed =
        build_signed_payment(utxos, 100_000, RECIPIENT, &own, &ring, &policy, network).unwrap();

    assert!(plans.len() >= 2);
    assert_eq!(plans.len(), signed.len());
    assert_eq!(
        plans.iter().map(|p| p.recipient_amount()).sum::<u64>(),
        100_000
    );
    for (plan, tx) in plans.iter().zip(&signed) {
        check_against_oracle(plan, tx, network);
    }
}

#[test]
fn follow_up_plans_match_rust_bitcoin() {
    let network = BtcNetwork::Mainnet;
    let (ring, own) = key_ring(network);
    let utxos = vec![utxo(1, 30_000, &own), utxo(2, 200_000, &own)];

    let plans = plan_payment(
        utxos,
        19_700,
        RECIPIENT,
        &own,
        &FeePolicy::default(),
        network,
    )
    .unwrap();
    assert_eq!(plans.len(), 2);

    for plan in &plans {
        let signed = sign_plan(plan, &ring, network).unwrap();
        check_against_oracle(plan, &signed, network);
    }
}

#[test]
fn testnet_pipeline_matches_rust_bitcoin() {
    let network = BtcNetwork::Testnet;
    let (ring, own) = key_ring(network);
    assert!(own.starts_with("tb1q"));
    let recipient = "tb1qq6hag67dl53wl99vzg42z8eyzfz2xlkvvlryfj";

    let plans = plan_payment(
        vec![utxo(9, 75_000, &own)],
        20_000,
        recipient,
        &own,
        &FeePolicy::default(),
        network,
    )
    .unwrap();
    let signed = sign_plan(&plans[0], &ring, network).unwrap();
    check_against_oracle(&plans[0], &signed, network);
}
