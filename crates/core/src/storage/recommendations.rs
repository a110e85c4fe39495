use crate::domain::recommendation::{
    BenefitProjection, Priority, Recommendation, RecommendationStatus, ScoredRecommendation,
};
use crate::error::DomainError;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

const REC_COLUMNS: &str = "id, analysis_id, product_id, priority, score, rationale, data_points, \
                           benefit_projection, status, created_at, approved_by, approved_at";

// The pending guard makes the transition an atomic compare-and-set: of two
// concurrent approve/reject calls, at most one update matches a row.
const TRANSITION_SQL: &str = "UPDATE recommendations \
     SET status = $2, approved_by = $3, approved_at = now() \
     WHERE id = $1 AND status = 'pending' \
     RETURNING id, analysis_id, product_id, priority, score, rationale, data_points, \
               benefit_projection, status, created_at, approved_by, approved_at";

type RecRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    f64,
    String,
    Vec<String>,
    Value,
    String,
    DateTime<Utc>,
    Option<String>,
    Option<DateTime<Utc>>,
);

/// Persists a generated set as pending rows, append-only: regenerating for
/// the same analysis adds a new set and never supersedes the old one.
///
/// Rows are written independently (no wrapping transaction). If an insert
/// fails mid-batch the rows already written stay, and the returned list is
/// authoritative for what was actually created.
pub async fn persist_generated(
    pool: &sqlx::PgPool,
    analysis_id: Uuid,
    scored: &[ScoredRecommendation],
) -> anyhow::Result<Vec<Recommendation>> {
    let mut created = Vec::with_capacity(scored.len());

    for (idx, rec) in scored.iter().enumerate() {
        match insert_pending(pool, analysis_id, rec).await {
            Ok(row) => created.push(row),
            Err(err) if created.is_empty() => {
                return Err(err).context("persist_generated failed before any row was written");
            }
            Err(err) => {
                tracing::error!(
                    %analysis_id,
                    persisted = created.len(),
                    remaining = scored.len() - idx,
                    error = %err,
                    "partial recommendation persistence; returning rows already written"
                );
                break;
            }
        }
    }

    Ok(created)
}

async fn insert_pending(
    pool: &sqlx::PgPool,
    analysis_id: Uuid,
    rec: &ScoredRecommendation,
) -> anyhow::Result<Recommendation> {
    let projection =
        serde_json::to_value(&rec.projection).context("serialize benefit_projection failed")?;

    let row = sqlx::query_as::<_, RecRow>(
        "INSERT INTO recommendations \
           (analysis_id, product_id, priority, score, rationale, data_points, benefit_projection) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id, analysis_id, product_id, priority, score, rationale, data_points, \
                   benefit_projection, status, created_at, approved_by, approved_at",
    )
    .bind(analysis_id)
    .bind(rec.product_id)
    .bind(rec.priority.as_str())
    .bind(rec.score)
    .bind(&rec.rationale)
    .bind(&rec.data_points)
    .bind(projection)
    .fetch_one(pool)
    .await
    .context("insert recommendations failed")?;

    rec_from_row(row)
}

pub async fn approve(
    pool: &sqlx::PgPool,
    recommendation_id: Uuid,
    actor: &str,
) -> anyhow::Result<RecommendationDetail> {
    transition(pool, recommendation_id, actor, RecommendationStatus::Approved).await
}

pub async fn reject(
    pool: &sqlx::PgPool,
    recommendation_id: Uuid,
    actor: &str,
) -> anyhow::Result<RecommendationDetail> {
    transition(pool, recommendation_id, actor, RecommendationStatus::Rejected).await
}

async fn transition(
    pool: &sqlx::PgPool,
    recommendation_id: Uuid,
    actor: &str,
    to: RecommendationStatus,
) -> anyhow::Result<RecommendationDetail> {
    let row = sqlx::query_as::<_, RecRow>(TRANSITION_SQL)
        .bind(recommendation_id)
        .bind(to.as_str())
        .bind(actor)
        .fetch_optional(pool)
        .await
        .context("recommendation status update failed")?;

    let Some(row) = row else {
        // Zero rows: either the id is unknown or the row left pending first.
        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM recommendations WHERE id = $1")
                .bind(recommendation_id)
                .fetch_optional(pool)
                .await
                .context("select recommendation status failed")?;

        return match current {
            None => Err(DomainError::not_found("recommendation", recommendation_id).into()),
            Some((status,)) => Err(DomainError::invalid_state(format!(
                "recommendation already {status}"
            ))
            .into()),
        };
    };

    let recommendation = rec_from_row(row)?;
    attach_context(pool, recommendation).await
}

/// Filters are conjunctive; an empty filter returns everything.
#[derive(Debug, Clone, Default)]
pub struct RecommendationFilter {
    pub analysis_id: Option<Uuid>,
    pub status: Option<RecommendationStatus>,
    pub priority: Option<Priority>,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    CreatedAt,
    Priority,
    Status,
    Score,
}

impl SortBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" | "createdAt" => Some(SortBy::CreatedAt),
            "priority" => Some(SortBy::Priority),
            "status" => Some(SortBy::Status),
            "score" => Some(SortBy::Score),
            _ => None,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            SortBy::CreatedAt => "created_at",
            SortBy::Priority => "priority",
            SortBy::Status => "status",
            SortBy::Score => "score",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortDir::Asc),
            "desc" => Some(SortDir::Desc),
            _ => None,
        }
    }

    fn keyword(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub sort_by: SortBy,
    pub sort_dir: SortDir,
    pub limit: i64,
    pub page: i64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            sort_by: SortBy::CreatedAt,
            sort_dir: SortDir::Desc,
            limit: 10,
            page: 1,
        }
    }
}

impl QueryOptions {
    fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(1))
    }
}

/// Offset-paginated, filtered, sorted listing. Sort columns come from a
/// closed enum, so no caller-supplied string ever reaches the SQL text.
pub async fn query(
    pool: &sqlx::PgPool,
    filter: &RecommendationFilter,
    options: &QueryOptions,
) -> anyhow::Result<Vec<Recommendation>> {
    let mut qb = build_query(filter, options);

    let rows: Vec<RecRow> = qb
        .build_query_as()
        .fetch_all(pool)
        .await
        .context("select recommendations failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(rec_from_row(row)?);
    }
    Ok(out)
}

fn build_query<'a>(
    filter: &'a RecommendationFilter,
    options: &QueryOptions,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {REC_COLUMNS} FROM recommendations WHERE TRUE"
    ));

    if let Some(id) = filter.analysis_id {
        qb.push(" AND analysis_id = ");
        qb.push_bind(id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status.as_str());
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ");
        qb.push_bind(priority.as_str());
    }
    if let Some(id) = filter.product_id {
        qb.push(" AND product_id = ");
        qb.push_bind(id);
    }

    qb.push(format!(
        " ORDER BY {} {}",
        options.sort_by.column(),
        options.sort_dir.keyword()
    ));
    qb.push(" OFFSET ");
    qb.push_bind(options.offset());
    qb.push(" LIMIT ");
    qb.push_bind(options.limit.max(1));

    qb
}

/// Recommendation plus the joined product and analysis→client context used
/// by detail views and the approve/reject responses.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationDetail {
    #[serde(flatten)]
    pub recommendation: Recommendation,
    pub product_name: String,
    pub product_category: String,
    pub client_name: String,
    pub analysis_status: String,
}

pub async fn get_by_id(
    pool: &sqlx::PgPool,
    recommendation_id: Uuid,
) -> anyhow::Result<Option<RecommendationDetail>> {
    let row = sqlx::query_as::<_, RecRow>(&format!(
        "SELECT {REC_COLUMNS} FROM recommendations WHERE id = $1"
    ))
    .bind(recommendation_id)
    .fetch_optional(pool)
    .await
    .context("select recommendation by id failed")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let recommendation = rec_from_row(row)?;
    Ok(Some(attach_context(pool, recommendation).await?))
}

async fn attach_context(
    pool: &sqlx::PgPool,
    recommendation: Recommendation,
) -> anyhow::Result<RecommendationDetail> {
    let (product_name, product_category, client_name, analysis_status): (
        String,
        String,
        String,
        String,
    ) = sqlx::query_as(
        "SELECT p.name, p.category, c.name, a.status \
         FROM treasury_products p \
         JOIN analyses a ON a.id = $2 \
         JOIN clients c ON c.id = a.client_id \
         WHERE p.id = $1",
    )
    .bind(recommendation.product_id)
    .bind(recommendation.analysis_id)
    .fetch_one(pool)
    .await
    .context("select recommendation context failed")?;

    Ok(RecommendationDetail {
        recommendation,
        product_name,
        product_category,
        client_name,
        analysis_status,
    })
}

/// Read shaping for the external report renderer: every recommendation for
/// an analysis with its product context, strongest first.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecommendation {
    pub id: Uuid,
    pub product_name: String,
    pub product_category: String,
    pub priority: Priority,
    pub score: f64,
    pub rationale: String,
    pub data_points: Vec<String>,
    pub benefit_projection: BenefitProjection,
    pub status: RecommendationStatus,
    pub created_at: DateTime<Utc>,
}

pub async fn list_for_report(
    pool: &sqlx::PgPool,
    analysis_id: Uuid,
) -> anyhow::Result<Vec<ReportRecommendation>> {
    let rows = sqlx::query_as::<
        _,
        (
            Uuid,
            String,
            String,
            String,
            f64,
            String,
            Vec<String>,
            Value,
            String,
            DateTime<Utc>,
        ),
    >(
        "SELECT r.id, p.name, p.category, r.priority, r.score, r.rationale, r.data_points, \
                r.benefit_projection, r.status, r.created_at \
         FROM recommendations r \
         JOIN treasury_products p ON p.id = r.product_id \
         WHERE r.analysis_id = $1 \
         ORDER BY r.score DESC, p.name ASC",
    )
    .bind(analysis_id)
    .fetch_all(pool)
    .await
    .context("select recommendations for report failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, name, category, priority, score, rationale, data_points, projection, status, created_at) in
        rows
    {
        out.push(ReportRecommendation {
            id,
            product_name: name,
            product_category: category,
            priority: parse_priority(&priority, id)?,
            score,
            rationale,
            data_points,
            benefit_projection: serde_json::from_value(projection)
                .with_context(|| format!("bad benefit_projection json (id={id})"))?,
            status: parse_status(&status, id)?,
            created_at,
        });
    }
    Ok(out)
}

fn rec_from_row(row: RecRow) -> anyhow::Result<Recommendation> {
    let (
        id,
        analysis_id,
        product_id,
        priority,
        score,
        rationale,
        data_points,
        projection,
        status,
        created_at,
        approved_by,
        approved_at,
    ) = row;

    Ok(Recommendation {
        id,
        analysis_id,
        product_id,
        priority: parse_priority(&priority, id)?,
        score,
        rationale,
        data_points,
        benefit_projection: serde_json::from_value(projection)
            .with_context(|| format!("bad benefit_projection json (id={id})"))?,
        status: parse_status(&status, id)?,
        created_at,
        approved_by,
        approved_at,
    })
}

fn parse_priority(s: &str, id: Uuid) -> anyhow::Result<Priority> {
    Priority::parse(s).with_context(|| format!("unknown priority in DB: {s} (id={id})"))
}

fn parse_status(s: &str, id: Uuid) -> anyhow::Result<RecommendationStatus> {
    RecommendationStatus::parse(s).with_context(|| format!("unknown status in DB: {s} (id={id})"))
}
