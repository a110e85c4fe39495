use crate::domain::recommendation::{Priority, Recommendation, ScoredRecommendation};
use crate::engine::{self, GenerationCriteria, ScoringConfig};
use crate::storage;
use uuid::Uuid;

/// One "generate recommendations for analysis X" invocation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub analysis_id: Uuid,
    pub criteria: GenerationCriteria,
    pub include_inactive: bool,
    pub category_filters: Vec<String>,
}

impl GenerationRequest {
    pub fn new(analysis_id: Uuid) -> Self {
        Self {
            analysis_id,
            criteria: GenerationCriteria::default(),
            include_inactive: false,
            category_filters: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct GenerationOutcome {
    pub created: Vec<Recommendation>,
    /// Scored output in engine order; parallel display context for `created`.
    pub scored: Vec<ScoredRecommendation>,
}

/// Full generation pass: load the completed analysis, pull candidates from
/// the catalog, score, and persist the resulting set as pending rows.
///
/// Fails with `DomainError::NotFound` when the analysis does not exist and
/// `DomainError::InvalidState` when it is not completed. An empty outcome is
/// success: no product was eligible.
pub async fn generate_for_analysis(
    pool: &sqlx::PgPool,
    request: &GenerationRequest,
    cfg: &ScoringConfig,
) -> anyhow::Result<GenerationOutcome> {
    request.criteria.validate()?;

    let analysis = storage::analyses::load_completed_analysis(pool, request.analysis_id).await?;
    let candidates = storage::products::list_candidate_products(
        pool,
        request.include_inactive,
        &request.category_filters,
    )
    .await?;

    let scored = engine::generate(&analysis, &candidates, &request.criteria, cfg);
    if scored.is_empty() {
        tracing::info!(
            analysis_id = %request.analysis_id,
            candidates = candidates.len(),
            "no eligible products; nothing persisted"
        );
        return Ok(GenerationOutcome {
            created: Vec::new(),
            scored,
        });
    }

    let created =
        storage::recommendations::persist_generated(pool, request.analysis_id, &scored).await?;

    tracing::info!(
        analysis_id = %request.analysis_id,
        candidates = candidates.len(),
        created = created.len(),
        high = count_priority(&scored, Priority::High),
        "persisted recommendation set"
    );

    Ok(GenerationOutcome { created, scored })
}

fn count_priority(scored: &[ScoredRecommendation], p: Priority) -> usize {
    scored.iter().filter(|r| r.priority == p).count()
}
