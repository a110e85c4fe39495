use crate::domain::analysis::Analysis;
use crate::domain::product::TreasuryProduct;
use crate::domain::recommendation::{Priority, ScoredRecommendation};

pub mod eligibility;
pub mod scoring;

/// Caller-supplied generation criteria. Range violations are rejected before
/// the engine runs.
#[derive(Debug, Clone)]
pub struct GenerationCriteria {
    pub max_recommendations: usize,
    pub priority_threshold: Option<f64>,
    pub min_priority: Option<Priority>,
}

impl Default for GenerationCriteria {
    fn default() -> Self {
        Self {
            max_recommendations: 5,
            priority_threshold: None,
            min_priority: None,
        }
    }
}

impl GenerationCriteria {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=20).contains(&self.max_recommendations),
            "max_recommendations must be 1..=20 (got {})",
            self.max_recommendations
        );
        if let Some(t) = self.priority_threshold {
            anyhow::ensure!(
                (0.0..=10.0).contains(&t),
                "priority_threshold must be 0..=10 (got {t})"
            );
        }
        Ok(())
    }
}

/// Scoring parameters, passed in explicitly per invocation so generation is
/// deterministic and testable. `Default` carries the production values.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Score an eligible product starts from.
    pub base_score: f64,
    pub balance_headroom_weight: f64,
    pub volume_headroom_weight: f64,
    pub idle_magnitude_weight: f64,
    pub idle_days_weight: f64,
    /// Scores at or above this map to high priority.
    pub high_cutoff: f64,
    /// Scores at or above this (and below `high_cutoff`) map to medium.
    pub medium_cutoff: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 4.0,
            balance_headroom_weight: 2.5,
            volume_headroom_weight: 1.0,
            idle_magnitude_weight: 2.0,
            idle_days_weight: 1.0,
            high_cutoff: 7.5,
            medium_cutoff: 5.0,
        }
    }
}

/// Scores candidate products against a completed analysis and returns the
/// ranked, capped list. Pure computation; performs no persistence.
///
/// An analysis with no assessable liquidity or idle-balance data yields an
/// empty list: absence of opportunity is a valid outcome, not an error.
pub fn generate(
    analysis: &Analysis,
    candidates: &[TreasuryProduct],
    criteria: &GenerationCriteria,
    cfg: &ScoringConfig,
) -> Vec<ScoredRecommendation> {
    if !analysis.has_assessable_metrics() {
        tracing::debug!(analysis_id = %analysis.id, "no assessable metrics; empty recommendation set");
        return Vec::new();
    }

    let mut scored = Vec::new();
    for product in candidates {
        match eligibility::check_eligibility(product, analysis) {
            Ok(()) => {
                let score = scoring::priority_score(analysis, product, cfg);
                let priority = scoring::priority_for_score(score, cfg);
                let projection = scoring::project_benefit(analysis, product);
                let (rationale, data_points) =
                    scoring::build_rationale(analysis, product, &projection);

                scored.push(ScoredRecommendation {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    product_category: product.category.clone(),
                    score,
                    priority,
                    rationale,
                    data_points,
                    projection,
                });
            }
            Err(reason) => {
                tracing::debug!(
                    analysis_id = %analysis.id,
                    product = %product.name,
                    %reason,
                    "product ineligible; skipping"
                );
            }
        }
    }

    if let Some(min) = criteria.min_priority {
        scored.retain(|r| r.priority.rank() >= min.rank());
    }
    if let Some(threshold) = criteria.priority_threshold {
        scored.retain(|r| r.score >= threshold);
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.projection
                    .total_annual_benefit()
                    .partial_cmp(&a.projection.total_annual_benefit())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.product_id.cmp(&b.product_id))
    });

    scored.truncate(criteria.max_recommendations);
    scored
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;
    use crate::domain::product::EligibilityRule;
    use uuid::Uuid;

    fn eligible_product(id: u128, name: &str, yield_pct: f64) -> TreasuryProduct {
        let mut p = product_fixture(
            name,
            "sweep",
            vec![EligibilityRule::MinBalance { amount: 250_000.0 }],
        );
        p.id = Uuid::from_u128(id);
        p.benefits.yield_improvement_pct = yield_pct;
        p
    }

    #[test]
    fn ineligible_products_are_dropped() {
        let analysis = analysis_fixture(185_000.0, Some(idle_fixture(50_000.0, 5, 250_000.0)));
        let candidates = vec![sweep_product_fixture()];

        let out = generate(
            &analysis,
            &candidates,
            &GenerationCriteria::default(),
            &ScoringConfig::default(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn cap_is_respected() {
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        let candidates: Vec<_> = (1..=8)
            .map(|i| eligible_product(i, &format!("Product {i}"), 2.5))
            .collect();

        let criteria = GenerationCriteria {
            max_recommendations: 3,
            ..Default::default()
        };
        let out = generate(&analysis, &candidates, &criteria, &ScoringConfig::default());
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn scores_are_non_increasing_and_ties_break_by_benefit() {
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        // Same rules, so identical scores; benefit differs via yield pct.
        let candidates = vec![
            eligible_product(1, "Low Yield", 1.0),
            eligible_product(2, "High Yield", 3.0),
            eligible_product(3, "Mid Yield", 2.0),
        ];

        let out = generate(
            &analysis,
            &candidates,
            &GenerationCriteria::default(),
            &ScoringConfig::default(),
        );
        assert_eq!(out.len(), 3);
        for pair in out.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(out[0].product_name, "High Yield");
        assert_eq!(out[1].product_name, "Mid Yield");
        assert_eq!(out[2].product_name, "Low Yield");
    }

    #[test]
    fn equal_score_and_benefit_order_by_product_id() {
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        let candidates = vec![
            eligible_product(7, "B", 2.5),
            eligible_product(2, "A", 2.5),
        ];

        let out = generate(
            &analysis,
            &candidates,
            &GenerationCriteria::default(),
            &ScoringConfig::default(),
        );
        assert_eq!(out[0].product_id, Uuid::from_u128(2));
        assert_eq!(out[1].product_id, Uuid::from_u128(7));
    }

    #[test]
    fn identical_inputs_yield_identical_output() {
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        let candidates = vec![
            eligible_product(1, "One", 2.5),
            eligible_product(2, "Two", 1.5),
        ];
        let criteria = GenerationCriteria::default();
        let cfg = ScoringConfig::default();

        let a = generate(&analysis, &candidates, &criteria, &cfg);
        let b = generate(&analysis, &candidates, &criteria, &cfg);
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn min_priority_filter_drops_lower_ordinals() {
        // Barely eligible, no idle data: scores sit at the baseline (low).
        let analysis = analysis_fixture(250_000.0, None);
        let candidates = vec![eligible_product(1, "Sweep", 2.5)];

        let criteria = GenerationCriteria {
            min_priority: Some(crate::domain::recommendation::Priority::Medium),
            ..Default::default()
        };
        let out = generate(&analysis, &candidates, &criteria, &ScoringConfig::default());
        assert!(out.is_empty());
    }

    #[test]
    fn numeric_threshold_filter_applies_to_score() {
        let analysis = analysis_fixture(456_000.0, Some(idle_fixture(185_000.0, 22, 250_000.0)));
        let candidates = vec![eligible_product(1, "Sweep", 2.5)];

        let criteria = GenerationCriteria {
            priority_threshold: Some(9.5),
            ..Default::default()
        };
        let out = generate(&analysis, &candidates, &criteria, &ScoringConfig::default());
        assert!(out.is_empty());
    }

    #[test]
    fn no_assessable_metrics_yields_empty_list() {
        let analysis = bare_analysis_fixture();
        let candidates = vec![product_fixture("Anything", "rdc", Vec::new())];

        let out = generate(
            &analysis,
            &candidates,
            &GenerationCriteria::default(),
            &ScoringConfig::default(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn criteria_validation_enforces_ranges() {
        let mut c = GenerationCriteria::default();
        assert!(c.validate().is_ok());

        c.max_recommendations = 0;
        assert!(c.validate().is_err());
        c.max_recommendations = 21;
        assert!(c.validate().is_err());

        c.max_recommendations = 20;
        c.priority_threshold = Some(10.5);
        assert!(c.validate().is_err());
        c.priority_threshold = Some(10.0);
        assert!(c.validate().is_ok());
    }
}
