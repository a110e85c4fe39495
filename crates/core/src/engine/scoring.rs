use crate::domain::analysis::Analysis;
use crate::domain::product::TreasuryProduct;
use crate::domain::recommendation::{BenefitProjection, Priority};
use crate::engine::eligibility::{
    effective_avg_daily_balance, min_balance_threshold, min_volume_threshold,
};
use crate::engine::ScoringConfig;

/// Numeric priority score in 0..=10. Eligible products start at the baseline
/// and earn additional credit for threshold headroom and for the magnitude of
/// idle liquidity relative to the configured idle threshold.
pub fn priority_score(analysis: &Analysis, product: &TreasuryProduct, cfg: &ScoringConfig) -> f64 {
    let mut score = cfg.base_score;
    let adb = effective_avg_daily_balance(analysis);

    if let Some(min) = min_balance_threshold(product) {
        if min > 0.0 {
            score += ((adb / min) - 1.0).clamp(0.0, 1.0) * cfg.balance_headroom_weight;
        }
    }

    if let Some(min) = min_volume_threshold(product) {
        if min > 0 {
            let ratio = analysis.summary.transaction_count as f64 / min as f64;
            score += (ratio - 1.0).clamp(0.0, 1.0) * cfg.volume_headroom_weight;
        }
    }

    if let Some(idle) = &analysis.idle_balance {
        if idle.threshold > 0.0 {
            score += (idle.avg_idle_amount / idle.threshold).clamp(0.0, 1.0)
                * cfg.idle_magnitude_weight;
        }
        let period_days = analysis.summary.date_range.days();
        let day_fraction = idle.days_with_idle_balance as f64 / period_days as f64;
        score += day_fraction.clamp(0.0, 1.0) * cfg.idle_days_weight;
    }

    score.clamp(0.0, 10.0)
}

pub fn priority_for_score(score: f64, cfg: &ScoringConfig) -> Priority {
    if score >= cfg.high_cutoff {
        Priority::High
    } else if score >= cfg.medium_cutoff {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Balance the yield projection applies to: average idle amount when the
/// analysis measured one, otherwise the excess over the idle threshold.
fn yield_basis(analysis: &Analysis) -> f64 {
    let Some(idle) = &analysis.idle_balance else {
        return 0.0;
    };
    if idle.avg_idle_amount > 0.0 {
        return idle.avg_idle_amount;
    }
    (effective_avg_daily_balance(analysis) - idle.threshold).max(0.0)
}

pub fn project_benefit(analysis: &Analysis, product: &TreasuryProduct) -> BenefitProjection {
    let annual_yield_improvement = if product.benefits.yield_improvement_pct > 0.0 {
        yield_basis(analysis) * product.benefits.yield_improvement_pct / 100.0
    } else {
        0.0
    };

    let annual_cost_savings = if product.benefits.cost_reduction > 0.0 {
        product.benefits.cost_reduction
    } else if let Some(fee) = product.pricing.transaction_fee {
        // No flat estimate on the product: scale the per-item saving by the
        // annualized transaction volume.
        annualized_transaction_count(analysis) * fee
    } else {
        0.0
    };

    let total = annual_yield_improvement + annual_cost_savings;
    let annual_fees = product.pricing.annual_fees();

    let roi_pct = if annual_fees > 0.0 {
        Some((total - annual_fees) / annual_fees * 100.0)
    } else {
        None
    };

    let monthly_net = total / 12.0 - product.pricing.monthly_fee;
    let payback_period_months = if product.pricing.setup_fee > 0.0 && monthly_net > 0.0 {
        Some(product.pricing.setup_fee / monthly_net)
    } else {
        None
    };

    BenefitProjection {
        annual_yield_improvement,
        annual_cost_savings,
        payback_period_months,
        roi_pct,
    }
}

fn annualized_transaction_count(analysis: &Analysis) -> f64 {
    let period_days = analysis.summary.date_range.days();
    analysis.summary.transaction_count as f64 / period_days as f64 * 365.0
}

/// Templated justification citing the metrics that drove eligibility, plus
/// the literal supporting numbers.
pub fn build_rationale(
    analysis: &Analysis,
    product: &TreasuryProduct,
    projection: &BenefitProjection,
) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut data_points = Vec::new();
    let adb = effective_avg_daily_balance(analysis);

    if let Some(min) = min_balance_threshold(product) {
        clauses.push(format!(
            "average daily balance of ${adb:.2} clears the ${min:.2} minimum"
        ));
        data_points.push(format!("Average daily balance: ${adb:.2}"));
        data_points.push(format!("Required minimum balance: ${min:.2}"));
    }

    if let Some(idle) = &analysis.idle_balance {
        if idle.avg_idle_amount > 0.0 {
            let period_days = analysis.summary.date_range.days();
            clauses.push(format!(
                "idle cash averaged ${:.2} on {} of {} days",
                idle.avg_idle_amount, idle.days_with_idle_balance, period_days
            ));
            data_points.push(format!("Average idle balance: ${:.2}", idle.avg_idle_amount));
            data_points.push(format!(
                "Days with idle balance: {}",
                idle.days_with_idle_balance
            ));
        }
    }

    if let Some(min) = min_volume_threshold(product) {
        let observed = analysis.summary.transaction_count;
        clauses.push(format!(
            "{observed} transactions over the period meets the {min} minimum"
        ));
        data_points.push(format!("Transaction count: {observed}"));
    }

    if clauses.is_empty() {
        clauses.push("current cash position supports this product".to_string());
    }

    let total = projection.total_annual_benefit();
    if total > 0.0 {
        data_points.push(format!("Projected annual benefit: ${total:.2}"));
    }

    let rationale = format!("{} recommended: {}.", product.name, clauses.join("; "));
    (rationale, data_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::EligibilityRule;
    use crate::engine::test_fixtures::{
        analysis_fixture, idle_fixture, product_fixture, sweep_product_fixture,
    };

    #[test]
    fn strong_idle_position_scores_high() {
        // avgDailyBalance 456k over a 250k minimum, idle 185k on 22 of 30
        // days against a 250k idle threshold.
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        let product = sweep_product_fixture();
        let cfg = ScoringConfig::default();

        let score = priority_score(&analysis, &product, &cfg);
        assert!(score > 8.27 && score < 8.28, "score = {score}");
        assert_eq!(priority_for_score(score, &cfg), Priority::High);
    }

    #[test]
    fn barely_eligible_product_scores_low() {
        let analysis = analysis_fixture(250_000.0, None);
        let product = sweep_product_fixture();
        let cfg = ScoringConfig::default();

        let score = priority_score(&analysis, &product, &cfg);
        assert_eq!(score, cfg.base_score);
        assert_eq!(priority_for_score(score, &cfg), Priority::Low);
    }

    #[test]
    fn yield_projection_uses_idle_balance() {
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        let product = sweep_product_fixture(); // 2.5% yield improvement

        let projection = project_benefit(&analysis, &product);
        assert!((projection.annual_yield_improvement - 4625.0).abs() < 1e-6);
        assert_eq!(projection.annual_cost_savings, 0.0);
    }

    #[test]
    fn roi_and_payback_derived_from_fees() {
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        let mut product = sweep_product_fixture();
        product.pricing.setup_fee = 500.0;
        product.pricing.monthly_fee = 100.0;

        let projection = project_benefit(&analysis, &product);
        // total 4625, fees 1700 => roi (4625-1700)/1700
        let roi = projection.roi_pct.unwrap();
        assert!((roi - 172.058_823_529_411_75).abs() < 1e-6);
        // monthly net 4625/12 - 100, payback 500 / that
        let payback = projection.payback_period_months.unwrap();
        assert!((payback - 500.0 / (4625.0 / 12.0 - 100.0)).abs() < 1e-9);
    }

    #[test]
    fn fee_free_product_omits_roi_and_payback() {
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        let product = sweep_product_fixture();

        let projection = project_benefit(&analysis, &product);
        assert!(projection.roi_pct.is_none());
        assert!(projection.payback_period_months.is_none());
    }

    #[test]
    fn cost_savings_scale_with_transaction_volume_when_no_flat_estimate() {
        // 900 transactions over 30 days, $0.10 saved per item.
        let mut analysis = analysis_fixture(456_000.0, None);
        analysis.summary.transaction_count = 900;
        let mut product = product_fixture(
            "Remote Deposit Capture",
            "rdc",
            vec![EligibilityRule::MinTransactionVolume { count: 500 }],
        );
        product.pricing.transaction_fee = Some(0.10);

        let projection = project_benefit(&analysis, &product);
        assert!((projection.annual_cost_savings - 900.0 / 30.0 * 365.0 * 0.10).abs() < 1e-9);
    }

    #[test]
    fn rationale_cites_driving_metrics() {
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        let product = sweep_product_fixture();
        let projection = project_benefit(&analysis, &product);

        let (rationale, data_points) = build_rationale(&analysis, &product, &projection);
        assert!(rationale.contains("$456000.00"));
        assert!(rationale.contains("$250000.00"));
        assert!(rationale.contains("22 of 30 days"));
        assert!(data_points.iter().any(|d| d.contains("$185000.00")));
        assert!(data_points.iter().any(|d| d.contains("$4625.00")));
    }
}
