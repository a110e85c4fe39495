use crate::domain::analysis::{
    Analysis, AnalysisStatus, AnalysisSummary, IdleBalanceAnalysis, LiquidityMetrics,
    SpendingCategory,
};
use crate::error::DomainError;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

type AnalysisRow = (
    Uuid,
    Uuid,
    String,
    Value,
    Option<Value>,
    Option<Value>,
    Option<Value>,
    DateTime<Utc>,
);

/// Guarded read of a completed analysis. Recommendations are only generated
/// against finished analyses; partial or failed ones carry no trustworthy
/// metrics.
pub async fn load_completed_analysis(
    pool: &sqlx::PgPool,
    analysis_id: Uuid,
) -> anyhow::Result<Analysis> {
    let analysis = load_analysis(pool, analysis_id).await?;
    ensure_completed(&analysis)?;
    Ok(analysis)
}

/// Status guard for generation: anything but `completed` is InvalidState.
pub fn ensure_completed(analysis: &Analysis) -> anyhow::Result<()> {
    if analysis.status != AnalysisStatus::Completed {
        return Err(DomainError::invalid_state(format!(
            "analysis {} is {}, not completed",
            analysis.id,
            analysis.status.as_str()
        ))
        .into());
    }
    Ok(())
}

/// Plain read without the status guard; used for detail joins.
pub async fn load_analysis(pool: &sqlx::PgPool, analysis_id: Uuid) -> anyhow::Result<Analysis> {
    let row = sqlx::query_as::<_, AnalysisRow>(
        "SELECT id, client_id, status, summary, liquidity_metrics, idle_balance, \
                spending_breakdown, created_at \
         FROM analyses \
         WHERE id = $1",
    )
    .bind(analysis_id)
    .fetch_optional(pool)
    .await
    .context("select analyses failed")?;

    let Some(row) = row else {
        return Err(DomainError::not_found("analysis", analysis_id).into());
    };

    analysis_from_row(row)
}

fn analysis_from_row(row: AnalysisRow) -> anyhow::Result<Analysis> {
    let (id, client_id, status, summary, liquidity, idle, spending, created_at) = row;

    let status = match status.as_str() {
        "processing" => AnalysisStatus::Processing,
        "completed" => AnalysisStatus::Completed,
        "failed" => AnalysisStatus::Failed,
        other => anyhow::bail!("unknown analysis status in DB: {other} (id={id})"),
    };

    let summary: AnalysisSummary =
        serde_json::from_value(summary).with_context(|| format!("bad summary json (id={id})"))?;
    let liquidity_metrics: Option<LiquidityMetrics> = liquidity
        .map(serde_json::from_value)
        .transpose()
        .with_context(|| format!("bad liquidity_metrics json (id={id})"))?;
    let idle_balance: Option<IdleBalanceAnalysis> = idle
        .map(serde_json::from_value)
        .transpose()
        .with_context(|| format!("bad idle_balance json (id={id})"))?;
    let spending_breakdown: Vec<SpendingCategory> = spending
        .map(serde_json::from_value)
        .transpose()
        .with_context(|| format!("bad spending_breakdown json (id={id})"))?
        .unwrap_or_default();

    Ok(Analysis {
        id,
        client_id,
        status,
        summary,
        liquidity_metrics,
        idle_balance,
        spending_breakdown,
        created_at,
    })
}
