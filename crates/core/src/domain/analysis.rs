use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A completed computation over a client's bank statement data. Produced by
/// the statement-analysis pipeline; read-only from this crate's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub client_id: Uuid,
    pub status: AnalysisStatus,
    pub summary: AnalysisSummary,
    pub liquidity_metrics: Option<LiquidityMetrics>,
    pub idle_balance: Option<IdleBalanceAnalysis>,
    pub spending_breakdown: Vec<SpendingCategory>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Processing => "processing",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_inflow: f64,
    pub total_outflow: f64,
    pub net_cash_flow: f64,
    pub avg_daily_balance: f64,
    pub transaction_count: i64,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Inclusive span in days; degenerate ranges count as a single day.
    pub fn days(&self) -> i64 {
        ((self.end - self.start).num_days() + 1).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityMetrics {
    pub avg_daily_balance: f64,
    pub min_balance: f64,
    pub max_balance: f64,
    pub volatility: f64,
    pub liquidity_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleBalanceAnalysis {
    pub avg_idle_amount: f64,
    pub days_with_idle_balance: i64,
    pub threshold: f64,
    pub potential_yield_gain: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendingCategory {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
    pub transaction_count: i64,
}

impl Analysis {
    /// True when there is nothing the scoring engine could assess; generation
    /// over such an analysis yields an empty list rather than an error.
    pub fn has_assessable_metrics(&self) -> bool {
        self.liquidity_metrics.is_some() || self.idle_balance.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_days_is_inclusive() {
        let r = DateRange {
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 1, 30).unwrap(),
        };
        assert_eq!(r.days(), 30);
    }

    #[test]
    fn degenerate_date_range_counts_one_day() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let r = DateRange { start: d, end: d };
        assert_eq!(r.days(), 1);
    }

    #[test]
    fn status_round_trips_snake_case() {
        let s: AnalysisStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(s, AnalysisStatus::Completed);
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"completed\"");
    }
}
