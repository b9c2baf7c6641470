use std::collections::HashSet;

use chain_btc::{plan_payment, sign_plan, BtcError, KeyRing, SignedTransaction, TransactionPlan};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::client::{Balance, ChainClient};
use crate::config::WalletConfig;
use crate::error::WalletError;

/// A payment to make from the wallet's own addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount_sats: u64,
    pub recipient: String,
    pub change_address: String,
    /// Addresses to spend from. All key-ring addresses when absent.
    #[serde(default)]
    pub source_addresses: Option<Vec<String>>,
}

/// Plans and their signed transactions, index-aligned, in broadcast order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedPayment {
    pub plans: Vec<TransactionPlan>,
    pub transactions: Vec<SignedTransaction>,
}

impl PreparedPayment {
    pub fn total_fee_sats(&self) -> u64 {
        self.plans.iter().map(|p| p.fee_sats).sum()
    }

    pub fn amount_sats(&self) -> u64 {
        self.plans.iter().map(|p| p.recipient_amount()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastFailure {
    pub index: usize,
    pub txid: String,
    pub error: String,
}

/// Outcome of broadcasting a prepared payment.
///
/// Broadcasting stops at the first rejected transaction; everything before it
/// is already on the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub broadcast_txids: Vec<String>,
    pub failure: Option<BroadcastFailure>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Fetch, plan, sign and broadcast against one chain client.
pub struct PaymentSession<C: ChainClient> {
    client: C,
    keys: KeyRing,
    config: WalletConfig,
}

impl<C: ChainClient> PaymentSession<C> {
    pub fn new(client: C, keys: KeyRing, config: WalletConfig) -> Self {
        Self {
            client,
            keys,
            config,
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    pub fn prepare_payment(
        &mut self,
        request: &PaymentRequest,
    ) -> Result<PreparedPayment, WalletError> {
        if request.amount_sats == 0 {
            return Err(WalletError::InvalidRequest("amountSats must be positive".into()));
        }
        let sources = self.source_addresses(request)?;
        let fetched = self.client.fetch_utxos_many(&sources)?;

        let mut seen = HashSet::new();
        let utxos: Vec<_> = fetched
            .into_iter()
            .filter(|u| {
                let fresh = seen.insert((u.txid.clone(), u.vout));
                if !fresh {
                    warn!("indexer reported {}:{} twice", u.txid, u.vout);
                }
                fresh
            })
            .collect();
        info!(
            "planning {} sat to {} from {} utxos across {} addresses",
            request.amount_sats,
            request.recipient,
            utxos.len(),
            sources.len()
        );

        let network = self.config.network;
        let plans = plan_payment(
            utxos,
            request.amount_sats,
            &request.recipient,
            &request.change_address,
            &self.config.policy,
            network,
        )?;
        let transactions = plans
            .iter()
            .map(|plan| sign_plan(plan, &self.keys, network))
            .collect::<Result<Vec<_>, BtcError>>()?;

        info!("prepared {} transactions", transactions.len());
        Ok(PreparedPayment {
            plans,
            transactions,
        })
    }

    /// Broadcast in order, stopping at the first failure.
    pub fn broadcast(&mut self, prepared: &PreparedPayment) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (index, tx) in prepared.transactions.iter().enumerate() {
            match self.client.broadcast(&tx.raw_hex) {
                Ok(txid) => {
                    if txid != tx.txid {
                        warn!("backend reported txid {txid} for {}", tx.txid);
                    }
                    info!(
                        "broadcast {}/{}: {}",
                        index + 1,
                        prepared.transactions.len(),
                        tx.txid
                    );
                    report.broadcast_txids.push(tx.txid.clone());
                }
                Err(e) => {
                    warn!("broadcast of {} failed: {e}", tx.txid);
                    report.failure = Some(BroadcastFailure {
                        index,
                        txid: tx.txid.clone(),
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }
        report
    }

    pub fn send_payment(
        &mut self,
        request: &PaymentRequest,
    ) -> Result<BroadcastReport, WalletError> {
        let prepared = self.prepare_payment(request)?;
        Ok(self.broadcast(&prepared))
    }

    /// Combined balance of every key-ring address.
    pub fn balance(&mut self) -> Result<Balance, WalletError> {
        let addresses: Vec<String> = self.keys.addresses().map(str::to_string).collect();
        let mut total = Balance::default();
        for address in &addresses {
            total = total + self.client.get_balance(address)?;
        }
        Ok(total)
    }

    fn source_addresses(&self, request: &PaymentRequest) -> Result<Vec<String>, WalletError> {
        let sources: Vec<String> = match &request.source_addresses {
            Some(list) => {
                if list.is_empty() {
                    return Err(WalletError::InvalidRequest("sourceAddresses is empty".into()));
                }
                let mut seen = HashSet::with_capacity(list.len());
                for address in list {
                    if !seen.insert(address.as_str()) {
                        return Err(WalletError::InvalidRequest(format!(
                            "source address {address} listed twice"
                        )));
                    }
                    if !self.keys.contains(address) {
                        return Err(BtcError::MissingPrivateKeyForInput {
                            address: address.clone(),
                        }
                        .into());
                    }
                }
                list.clone()
            }
            None => self.keys.addresses().map(str::to_string).collect(),
        };
        if sources.is_empty() {
            return Err(WalletError::NoSpendableAddresses);
        }
        Ok(sources)
    }
}
