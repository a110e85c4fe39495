use crate::domain::analysis::Analysis;
use crate::domain::product::{EligibilityRule, TreasuryProduct};

/// Balance figure used for threshold checks. Liquidity metrics are the
/// preferred source; the statement summary is the fallback when the analysis
/// pipeline produced none.
pub fn effective_avg_daily_balance(analysis: &Analysis) -> f64 {
    analysis
        .liquidity_metrics
        .as_ref()
        .map(|m| m.avg_daily_balance)
        .unwrap_or(analysis.summary.avg_daily_balance)
}

/// Evaluates one rule against the analysis snapshot. `Err` carries the
/// failing reason, which is logged for diagnostics but never surfaced as a
/// recommendation.
pub fn evaluate_rule(rule: &EligibilityRule, analysis: &Analysis) -> Result<(), String> {
    match rule {
        EligibilityRule::MinBalance { amount } => {
            let adb = effective_avg_daily_balance(analysis);
            if adb >= *amount {
                Ok(())
            } else {
                Err(format!(
                    "average daily balance {adb:.2} below minimum {amount:.2}"
                ))
            }
        }
        EligibilityRule::MinTransactionVolume { count } => {
            let observed = analysis.summary.transaction_count;
            if observed >= *count {
                Ok(())
            } else {
                Err(format!(
                    "transaction count {observed} below minimum {count}"
                ))
            }
        }
        // Account-type data lives outside the analysis snapshot, so the
        // constraint is treated as satisfiable at this layer.
        EligibilityRule::AccountTypeIn { .. } => Ok(()),
    }
}

/// A product is eligible iff every declared rule holds.
pub fn check_eligibility(product: &TreasuryProduct, analysis: &Analysis) -> Result<(), String> {
    for rule in &product.eligibility_rules {
        evaluate_rule(rule, analysis)?;
    }
    Ok(())
}

/// Largest declared minimum-balance threshold, if any.
pub fn min_balance_threshold(product: &TreasuryProduct) -> Option<f64> {
    product
        .eligibility_rules
        .iter()
        .filter_map(|r| match r {
            EligibilityRule::MinBalance { amount } => Some(*amount),
            _ => None,
        })
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

/// Largest declared minimum-transaction-volume threshold, if any.
pub fn min_volume_threshold(product: &TreasuryProduct) -> Option<i64> {
    product
        .eligibility_rules
        .iter()
        .filter_map(|r| match r {
            EligibilityRule::MinTransactionVolume { count } => Some(*count),
            _ => None,
        })
        .max()
}
