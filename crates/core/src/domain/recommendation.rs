use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordinal urgency of a recommendation, derived from the numeric priority
/// score via fixed cut points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    /// Ordinal rank for threshold comparisons: high > medium > low.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Approved => "approved",
            RecommendationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecommendationStatus::Pending),
            "approved" => Some(RecommendationStatus::Approved),
            "rejected" => Some(RecommendationStatus::Rejected),
            _ => None,
        }
    }
}

/// Quantified financial upside of adopting a recommended product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitProjection {
    pub annual_yield_improvement: f64,
    pub annual_cost_savings: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payback_period_months: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi_pct: Option<f64>,
}

impl BenefitProjection {
    pub fn total_annual_benefit(&self) -> f64 {
        self.annual_yield_improvement + self.annual_cost_savings
    }
}

/// Engine output before persistence: one eligible product with its score,
/// projection and supporting evidence. Carries the product display fields so
/// callers never re-join the catalog for presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecommendation {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_category: String,
    pub score: f64,
    pub priority: Priority,
    pub rationale: String,
    pub data_points: Vec<String>,
    pub projection: BenefitProjection,
}

/// A persisted recommendation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub product_id: Uuid,
    pub priority: Priority,
    pub score: f64,
    pub rationale: String,
    pub data_points: Vec<String>,
    pub benefit_projection: BenefitProjection,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}
