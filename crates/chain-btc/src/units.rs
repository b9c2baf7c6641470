use crate::error::BtcError;

/// Satoshis per whole coin.
pub const SAT_PER_UNIT: u64 = 100_000_000;

const DECIMALS: usize = 8;

/// Parse a decimal coin amount (e.g. `"0.0015"`) into satoshis.
///
/// At most eight fractional digits are accepted; `_` and `,` separators in
/// the integer part are ignored.
pub fn parse_coin_amount(value: &str) -> Result<u64, BtcError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BtcError::InvalidAmount("amount is required".into()));
    }
    if value.starts_with('-') {
        return Err(BtcError::InvalidAmount("amount must be positive".into()));
    }

    let (whole, frac) = match value.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (value, None),
    };

    let whole: String = whole.chars().filter(|c| *c != '_' && *c != ',').collect();
    if !whole.chars().all(|c| c.is_ascii_digit()) {
        return Err(BtcError::InvalidAmount(format!("not a decimal amount: {value}")));
    }

    let mut sats: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| BtcError::InvalidAmount(format!("amount too large: {value}")))?
    };
    sats = sats
        .checked_mul(SAT_PER_UNIT)
        .ok_or_else(|| BtcError::InvalidAmount(format!("amount too large: {value}")))?;

    if let Some(frac) = frac {
        if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(BtcError::InvalidAmount(format!("not a decimal amount: {value}")));
        }
        if frac.len() > DECIMALS {
            return Err(BtcError::InvalidAmount(format!(
                "more than {} decimal places: {value}",
                DECIMALS
            )));
        }
        let padded = format!("{frac:0<width$}", width = DECIMALS);
        let frac_sats = padded
            .parse::<u64>()
            .map_err(|_| BtcError::InvalidAmount(format!("not a decimal amount: {value}")))?;
        sats = sats
            .checked_add(frac_sats)
            .ok_or_else(|| BtcError::InvalidAmount(format!("amount too large: {value}")))?;
    }

    Ok(sats)
}

/// Format satoshis as a decimal coin amount with trailing zeros trimmed.
pub fn format_coin_amount(sats: u64) -> String {
    let whole = sats / SAT_PER_UNIT;
    let frac = sats % SAT_PER_UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0width$}", width = DECIMALS);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
