use std::collections::HashSet;

use log::{debug, warn};

use crate::address;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::transaction::parse_txid;
use crate::types::{FeePolicy, TransactionOutput, TransactionPlan, UnspentOutput};

/// A plan under construction. `utxo.value_sats == recipient + change + fee`
/// holds after every mutation.
#[derive(Debug)]
struct Draft {
    utxo: UnspentOutput,
    recipient_sats: u64,
    change_sats: u64,
    fee_sats: u64,
}

impl Draft {
    fn new(utxo: UnspentOutput, recipient_sats: u64, fee_sats: u64) -> Self {
        let change_sats = utxo.value_sats - recipient_sats - fee_sats;
        Self {
            utxo,
            recipient_sats,
            change_sats,
            fee_sats,
        }
    }

    fn into_plan(
        self,
        recipient: &str,
        change_address: &str,
        policy: &FeePolicy,
    ) -> TransactionPlan {
        let mut fee_sats = self.fee_sats;
        let mut change_sats = self.change_sats;

        let mut outputs = vec![TransactionOutput {
            value_sats: self.recipient_sats,
            address: recipient.to_string(),
        }];
        if change_sats > policy.dust_sats {
            outputs.push(TransactionOutput {
                value_sats: change_sats,
                address: change_address.to_string(),
            });
        } else if change_sats > 0 {
            warn!(
                "{}:{} leaves {} sat of dust change; adding it to the fee",
                self.utxo.txid, self.utxo.vout, change_sats
            );
            fee_sats += change_sats;
            change_sats = 0;
        }

        TransactionPlan {
            input: self.utxo.into(),
            outputs,
            fee_sats,
            change_amount_sats: change_sats,
            change_address: change_address.to_string(),
        }
    }
}

/// Plan the transactions that pay `amount_sats` to `recipient`.
///
/// Every plan spends exactly one UTXO. UTXOs are consumed smallest first; when
/// one UTXO cannot cover the remainder plus the fee it is spent whole and the
/// next one continues the payment. The recipient outputs of the returned plans
/// sum to `amount_sats`.
///
/// Dust outputs are then rebalanced: a dust recipient output is evened out
/// against the largest other recipient output, and a dust change is turned
/// into a real change output by moving half of that plan's payment into a
/// follow-up plan spending a not yet used UTXO. Follow-up plans are appended
/// after the plans they relieve. Dust change that cannot be absorbed is added
/// to the fee rather than emitted.
pub fn plan_payment(
    utxos: Vec<UnspentOutput>,
    amount_sats: u64,
    recipient: &str,
    change_address: &str,
    policy: &FeePolicy,
    network: BtcNetwork,
) -> Result<Vec<TransactionPlan>, BtcError> {
    address::script_pubkey_for_address(recipient, network)?;
    address::script_pubkey_for_address(change_address, network)?;

    if amount_sats == 0 {
        return Err(BtcError::InvalidAmount("amount must be positive".into()));
    }
    validate_utxos(&utxos)?;

    let mut sorted = utxos;
    sorted.sort_by_key(|u| u.value_sats);

    let total = sorted
        .iter()
        .try_fold(0u64, |acc, u| acc.checked_add(u.value_sats))
        .ok_or_else(|| BtcError::InvalidUtxo("total utxo value overflows".into()))?;
    if total < amount_sats {
        return Err(BtcError::InsufficientFunds {
            available: total,
            required: amount_sats,
        });
    }

    let fee = policy.fee_sats;
    let mut drafts = Vec::new();
    let mut unused = Vec::new();
    let mut remaining = amount_sats;

    for utxo in sorted {
        if remaining == 0 {
            unused.push(utxo);
            continue;
        }

        let value = utxo.value_sats;
        if value >= remaining.saturating_add(fee) {
            debug!(
                "{}:{} ({value} sat) covers remaining {remaining} sat",
                utxo.txid, utxo.vout
            );
            drafts.push(Draft::new(utxo, remaining, fee));
            remaining = 0;
        } else if value > fee {
            let tx_amount = value - fee;
            debug!(
                "{}:{} ({value} sat) contributes {tx_amount} sat",
                utxo.txid, utxo.vout
            );
            remaining -= tx_amount;
            drafts.push(Draft::new(utxo, tx_amount, fee));
        } else {
            debug!(
                "{}:{} ({value} sat) cannot cover the {fee} sat fee; skipped",
                utxo.txid, utxo.vout
            );
        }
    }

    if remaining > 0 {
        return Err(BtcError::InsufficientFunds {
            available: amount_sats - remaining,
            required: amount_sats,
        });
    }

    rebalance_recipient_dust(&mut drafts, policy);
    absorb_change_dust(&mut drafts, &mut unused, policy);

    Ok(drafts
        .into_iter()
        .map(|d| d.into_plan(recipient, change_address, policy))
        .collect())
}

fn validate_utxos(utxos: &[UnspentOutput]) -> Result<(), BtcError> {
    let mut seen = HashSet::with_capacity(utxos.len());
    for utxo in utxos {
        let txid = parse_txid(&utxo.txid)
            .map_err(|e| BtcError::InvalidUtxo(format!("{}:{}: {e}", utxo.txid, utxo.vout)))?;
        if !seen.insert((txid, utxo.vout)) {
            return Err(BtcError::InvalidUtxo(format!(
                "duplicate outpoint {}:{}",
                utxo.txid, utxo.vout
            )));
        }
    }
    Ok(())
}

/// Even out dust recipient outputs against the largest other recipient output.
///
/// The two recipient outputs become `floor(total / 2)` and the rest. The
/// dust plan pays its increase out of its own change and the partner returns
/// the same amount as change, so both plans stay balanced. Nothing changes
/// unless both halves and both resulting changes are free of dust.
fn rebalance_recipient_dust(drafts: &mut [Draft], policy: &FeePolicy) {
    if drafts.len() < 2 {
        return;
    }

    for i in 0..drafts.len() {
        let dusty = drafts[i].recipient_sats;
        if !policy.is_dust(dusty) {
            continue;
        }

        let Some(j) = (0..drafts.len())
            .filter(|&j| j != i)
            .max_by_key(|&j| drafts[j].recipient_sats)
        else {
            continue;
        };

        let total = dusty + drafts[j].recipient_sats;
        let low = total / 2;
        let high = total - low;
        if low <= policy.dust_sats || high <= policy.dust_sats {
            warn!("recipient output of {dusty} sat stays dust: partner too small");
            continue;
        }

        let shift = low - dusty;
        let Some(change_i) = drafts[i].change_sats.checked_sub(shift) else {
            warn!("recipient output of {dusty} sat stays dust: no change to fund it");
            continue;
        };
        let change_j = drafts[j].change_sats + shift;
        if policy.is_dust(change_i) || policy.is_dust(change_j) {
            warn!(
                "recipient output of {dusty} sat stays dust: rebalancing would create dust change"
            );
            continue;
        }

        debug!(
            "rebalanced recipient outputs {dusty} + {} -> {low} + {high}",
            drafts[j].recipient_sats
        );
        drafts[i].recipient_sats = low;
        drafts[i].change_sats = change_i;
        drafts[j].recipient_sats = high;
        drafts[j].change_sats = change_j;
    }
}

/// Turn dust change into a real change output by moving half of the plan's
/// recipient output into a follow-up plan funded by an unused UTXO.
///
/// `unused` is sorted ascending, so the smallest UTXO able to carry the moved
/// half plus the fee is picked.
fn absorb_change_dust(
    drafts: &mut Vec<Draft>,
    unused: &mut Vec<UnspentOutput>,
    policy: &FeePolicy,
) {
    let planned = drafts.len();
    for i in 0..planned {
        let change = drafts[i].change_sats;
        if !policy.is_dust(change) {
            continue;
        }

        let recipient_sats = drafts[i].recipient_sats;
        if recipient_sats <= policy.dust_sats.saturating_mul(2) {
            continue;
        }
        let moved = recipient_sats / 2;
        let kept = recipient_sats - moved;
        if moved <= policy.dust_sats || kept <= policy.dust_sats {
            continue;
        }

        let Some(needed) = moved.checked_add(policy.fee_sats) else {
            continue;
        };
        let Some(pos) = unused.iter().position(|u| u.value_sats >= needed) else {
            debug!("no unused utxo can carry {moved} sat; dust change of {change} sat kept");
            continue;
        };
        let utxo = unused.remove(pos);

        debug!(
            "absorbing {change} sat dust change: moving {moved} sat to follow-up {}:{}",
            utxo.txid, utxo.vout
        );
        drafts[i].recipient_sats = kept;
        drafts[i].change_sats = change + moved;
        drafts.push(Draft::new(utxo, moved, policy.fee_sats));
    }
}
