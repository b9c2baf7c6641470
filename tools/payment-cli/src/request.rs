use chain_btc::units::{format_coin_amount, parse_coin_amount};
use chain_btc::{
    build_signed_payment, plan_payment, BtcNetwork, FeePolicy, KeyRing, SignedTransaction,
    TransactionPlan, UnspentOutput,
};
use serde::Deserialize;

use crate::error::AppError;

/// Satoshis as an integer, or a decimal coin amount as a string.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum AmountInput {
    Sats(u64),
    Coins(String),
}

impl AmountInput {
    pub fn to_sats(&self) -> Result<u64, AppError> {
        match self {
            AmountInput::Sats(sats) => Ok(*sats),
            AmountInput::Coins(text) => Ok(parse_coin_amount(text)?),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct KeyEntry {
    pub address: String,
    pub private_key_hex: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestFile {
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub fee_sats: Option<u64>,
    #[serde(default)]
    pub dust_sats: Option<u64>,
    pub utxos: Vec<UnspentOutput>,
    pub amount: AmountInput,
    pub recipient: String,
    pub change_address: String,
    #[serde(default)]
    pub private_keys: Vec<KeyEntry>,
}

impl PaymentRequestFile {
    pub fn policy(&self) -> FeePolicy {
        let defaults = FeePolicy::default();
        FeePolicy {
            fee_sats: self.fee_sats.unwrap_or(defaults.fee_sats),
            dust_sats: self.dust_sats.unwrap_or(defaults.dust_sats),
        }
    }

    pub fn key_ring(&self) -> Result<KeyRing, AppError> {
        let mut ring = KeyRing::new();
        for entry in &self.private_keys {
            ring.insert_hex(&entry.address, &entry.private_key_hex)?;
        }
        Ok(ring)
    }

    pub fn plan(&self, network: BtcNetwork) -> Result<Vec<TransactionPlan>, AppError> {
        let amount_sats = self.amount.to_sats()?;
        let plans = plan_payment(
            self.utxos.clone(),
            amount_sats,
            &self.recipient,
            &self.change_address,
            &self.policy(),
            network,
        )?;
        log_summary(&plans);
        Ok(plans)
    }

    pub fn sign(&self, network: BtcNetwork) -> Result<Vec<SignedTransaction>, AppError> {
        if self.private_keys.is_empty() {
            return Err(AppError::InputValidation(
                "privateKeys is required for signing".into(),
            ));
        }
        let keys = self.key_ring()?;
        let amount_sats = self.amount.to_sats()?;
        Ok(build_signed_payment(
            self.utxos.clone(),
            amount_sats,
            &self.recipient,
            &self.change_address,
            &keys,
            &self.policy(),
            network,
        )?)
    }
}

fn log_summary(plans: &[TransactionPlan]) {
    let sent: u64 = plans.iter().map(|p| p.recipient_amount()).sum();
    let fees: u64 = plans.iter().map(|p| p.fee_sats).sum();
    log::info!(
        "{} transaction(s) sending {} with {} in fees",
        plans.len(),
        format_coin_amount(sent),
        format_coin_amount(fees)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const RECIPIENT: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    fn request_json(amount: &str, keys: bool) -> String {
        let keys = if keys {
            format!(
                r#","privateKeys":[{{"address":"{OWN}","privateKeyHex":"{}01"}}]"#,
                "00".repeat(31)
            )
        } else {
            String::new()
        };
        format!(
            r#"{{
                "utxos":[{{"txid":"{}","vout":0,"valueSats":100000,"address":"{OWN}"}}],
                "amount":{amount},
                "recipient":"{RECIPIENT}",
                "changeAddress":"{OWN}"{keys}
            }}"#,
            "ab".repeat(32)
        )
    }

    #[test]
    fn amount_accepts_sats_or_coins() {
        let sats: AmountInput = serde_json::from_str("50000").unwrap();
        assert_eq!(sats.to_sats().unwrap(), 50_000);
        let coins: AmountInput = serde_json::from_str(r#""0.0005""#).unwrap();
        assert_eq!(coins.to_sats().unwrap(), 50_000);
        let bad: AmountInput = serde_json::from_str(r#""lots""#).unwrap();
        assert!(bad.to_sats().is_err());
    }

    #[test]
    fn policy_defaults_and_overrides() {
        let mut request: PaymentRequestFile =
            serde_json::from_str(&request_json("1000", false)).unwrap();
        assert_eq!(request.policy(), FeePolicy::default());

        request.fee_sats = Some(2_000);
        assert_eq!(request.policy().fee_sats, 2_000);
        assert_eq!(request.policy().dust_sats, 546);
    }

    #[test]
    fn plans_request() {
        let request: PaymentRequestFile =
            serde_json::from_str(&request_json(r#""0.0005""#, false)).unwrap();
        let plans = request.plan(BtcNetwork::Mainnet).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].recipient_amount(), 50_000);
        assert_eq!(plans[0].change_amount_sats, 40_000);
    }

    #[test]
    fn signs_request() {
        let request: PaymentRequestFile =
            serde_json::from_str(&request_json("50000", true)).unwrap();
        let signed = request.sign(BtcNetwork::Mainnet).unwrap();
        assert_eq!(signed.len(), 1);
        assert!(signed[0].raw_hex.starts_with("020000000001"));
    }

    #[test]
    fn signing_requires_keys() {
        let request: PaymentRequestFile =
            serde_json::from_str(&request_json("50000", false)).unwrap();
        assert!(matches!(
            request.sign(BtcNetwork::Mainnet),
            Err(AppError::InputValidation(_))
        ));
    }

    #[test]
    fn wrong_network_is_an_engine_error() {
        let request: PaymentRequestFile =
            serde_json::from_str(&request_json("50000", false)).unwrap();
        assert!(matches!(
            request.plan(BtcNetwork::Testnet),
            Err(AppError::Engine(_))
        ));
    }
}
