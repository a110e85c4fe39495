use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A treasury product from the catalog (sweep, ZBA, RDC, ...). Managed by the
/// admin surface elsewhere; read-only to the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryProduct {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: String,
    pub features: Vec<String>,
    pub eligibility_rules: Vec<EligibilityRule>,
    pub benefits: ProductBenefits,
    pub pricing: ProductPricing,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Closed set of eligibility predicates. Stored as tagged JSON in the
/// catalog; an unknown `kind` fails deserialization loudly instead of being
/// silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EligibilityRule {
    MinBalance { amount: f64 },
    MinTransactionVolume { count: i64 },
    AccountTypeIn { account_types: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductBenefits {
    /// Annualized yield improvement in percent (e.g. 2.5 means 2.5%).
    #[serde(default)]
    pub yield_improvement_pct: f64,
    /// Flat annual cost reduction estimate.
    #[serde(default)]
    pub cost_reduction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency_gain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_reduction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPricing {
    #[serde(default)]
    pub setup_fee: f64,
    #[serde(default)]
    pub monthly_fee: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis_points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_fee: Option<f64>,
}

impl ProductPricing {
    /// First-year all-in fee load: setup plus twelve monthly fees.
    pub fn annual_fees(&self) -> f64 {
        self.setup_fee + 12.0 * self.monthly_fee
    }
}
