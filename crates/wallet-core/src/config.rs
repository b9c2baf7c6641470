use chain_btc::{BtcNetwork, FeePolicy};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Wallet-wide settings: which network to use and how to price transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletConfig {
    pub network: BtcNetwork,
    pub policy: FeePolicy,
}

impl WalletConfig {
    pub fn new(network: BtcNetwork) -> Self {
        Self {
            network,
            policy: FeePolicy::default(),
        }
    }

    /// Parse and validate a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, WalletError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| WalletError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WalletError> {
        if self.policy.fee_sats == 0 {
            return Err(WalletError::InvalidConfig("feeSats must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = WalletConfig::from_json("{}").unwrap();
        assert_eq!(config, WalletConfig::default());
        assert_eq!(config.network, BtcNetwork::Mainnet);
        assert_eq!(config.policy.fee_sats, 10_000);
        assert_eq!(config.policy.dust_sats, 546);
    }

    #[test]
    fn parses_network_and_policy() {
        let config = WalletConfig::from_json(
            r#"{"network":"testnet","policy":{"feeSats":2000,"dustSats":300}}"#,
        )
        .unwrap();
        assert_eq!(config.network, BtcNetwork::Testnet);
        assert_eq!(config.policy.fee_sats, 2_000);
        assert_eq!(config.policy.dust_sats, 300);
    }

    #[test]
    fn partial_policy_keeps_other_default() {
        let config = WalletConfig::from_json(r#"{"policy":{"feeSats":5000}}"#).unwrap();
        assert_eq!(config.policy.fee_sats, 5_000);
        assert_eq!(config.policy.dust_sats, 546);
    }

    #[test]
    fn rejects_zero_fee() {
        assert!(matches!(
            WalletConfig::from_json(r#"{"policy":{"feeSats":0}}"#),
            Err(WalletError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_unknown_network() {
        assert!(WalletConfig::from_json(r#"{"network":"litecoin"}"#).is_err());
    }
}
