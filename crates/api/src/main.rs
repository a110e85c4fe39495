use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use treasury_core::domain::recommendation::{Priority, Recommendation, RecommendationStatus};
use treasury_core::engine::{GenerationCriteria, ScoringConfig};
use treasury_core::error::DomainError;
use treasury_core::recommend::{self, GenerationRequest};
use treasury_core::storage::recommendations::{
    self, QueryOptions, RecommendationFilter, SortBy, SortDir,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = treasury_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match treasury_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState { pool };
    let app = router(state).layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/recommendations/generate", post(generate))
        .route("/recommendations", get(list))
        .route("/recommendations/:id", get(get_by_id))
        .route("/recommendations/:id/approve", put(approve))
        .route("/recommendations/:id/reject", put(reject))
        .route("/analyses/:analysis_id/report-data", get(report_data))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<PgPool>,
}

type ApiError = (StatusCode, String);

fn require_pool(state: &AppState) -> Result<&PgPool, ApiError> {
    state.pool.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "database unavailable".to_string(),
    ))
}

/// Maps core failures to status codes: NotFound → 404, InvalidState → 400,
/// anything else → 500 (captured).
fn map_core_error(err: anyhow::Error) -> ApiError {
    if let Some(domain) = err.downcast_ref::<DomainError>() {
        let status = match domain {
            DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::InvalidState { .. } => StatusCode::BAD_REQUEST,
        };
        return (status, domain.to_string());
    }

    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    )
}

fn bad_request(detail: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, detail.into())
}

#[derive(Debug, Deserialize)]
struct GenerateBody {
    // Optional here so a missing id maps to 400 rather than a deserialization
    // rejection; the handler checks presence first.
    analysis_id: Option<Uuid>,
    max_recommendations: Option<usize>,
    priority_threshold: Option<f64>,
    include_inactive: Option<bool>,
    category_filters: Option<Vec<String>>,
    min_priority: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreatedRecommendation {
    #[serde(flatten)]
    recommendation: Recommendation,
    product_name: String,
    product_category: String,
}

async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> Result<(StatusCode, Json<Vec<CreatedRecommendation>>), ApiError> {
    let analysis_id = body
        .analysis_id
        .ok_or_else(|| bad_request("analysis_id is required"))?;

    let min_priority = body
        .min_priority
        .as_deref()
        .map(|s| Priority::parse(s).ok_or_else(|| bad_request(format!("unknown min_priority: {s}"))))
        .transpose()?;

    let mut request = GenerationRequest::new(analysis_id);
    request.criteria = GenerationCriteria {
        max_recommendations: body.max_recommendations.unwrap_or(5),
        priority_threshold: body.priority_threshold,
        min_priority,
    };
    request.include_inactive = body.include_inactive.unwrap_or(false);
    request.category_filters = body.category_filters.unwrap_or_default();

    // Criteria range violations are a caller error, reported before any core
    // logic or storage access.
    request
        .criteria
        .validate()
        .map_err(|e| bad_request(format!("{e:#}")))?;

    let pool = require_pool(&state)?;

    let outcome = recommend::generate_for_analysis(pool, &request, &ScoringConfig::default())
        .await
        .map_err(map_core_error)?;

    let body: Vec<CreatedRecommendation> = outcome
        .created
        .into_iter()
        .zip(outcome.scored)
        .map(|(recommendation, scored)| CreatedRecommendation {
            recommendation,
            product_name: scored.product_name,
            product_category: scored.product_category,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(body)))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    analysis_id: Option<Uuid>,
    status: Option<String>,
    priority: Option<String>,
    product_id: Option<Uuid>,
    sort_by: Option<String>,
    sort_type: Option<String>,
    limit: Option<i64>,
    page: Option<i64>,
}

async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let filter = RecommendationFilter {
        analysis_id: params.analysis_id,
        status: params
            .status
            .as_deref()
            .map(|s| {
                RecommendationStatus::parse(s)
                    .ok_or_else(|| bad_request(format!("unknown status: {s}")))
            })
            .transpose()?,
        priority: params
            .priority
            .as_deref()
            .map(|s| Priority::parse(s).ok_or_else(|| bad_request(format!("unknown priority: {s}"))))
            .transpose()?,
        product_id: params.product_id,
    };

    let mut options = QueryOptions::default();
    if let Some(s) = params.sort_by.as_deref() {
        options.sort_by =
            SortBy::parse(s).ok_or_else(|| bad_request(format!("unknown sort_by: {s}")))?;
    }
    if let Some(s) = params.sort_type.as_deref() {
        options.sort_dir =
            SortDir::parse(s).ok_or_else(|| bad_request(format!("unknown sort_type: {s}")))?;
    }
    if let Some(limit) = params.limit {
        if limit < 1 {
            return Err(bad_request(format!("limit must be >= 1 (got {limit})")));
        }
        options.limit = limit;
    }
    if let Some(page) = params.page {
        if page < 1 {
            return Err(bad_request(format!("page must be >= 1 (got {page})")));
        }
        options.page = page;
    }

    let pool = require_pool(&state)?;
    let rows = recommendations::query(pool, &filter, &options)
        .await
        .map_err(map_core_error)?;
    Ok(Json(rows))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<recommendations::RecommendationDetail>, ApiError> {
    let pool = require_pool(&state)?;

    let detail = recommendations::get_by_id(pool, id)
        .await
        .map_err(map_core_error)?
        .ok_or((StatusCode::NOT_FOUND, format!("recommendation not found: {id}")))?;

    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
struct ApproveBody {
    approved_by: String,
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<recommendations::RecommendationDetail>, ApiError> {
    let actor = validate_actor(&body.approved_by)?;
    let pool = require_pool(&state)?;

    let detail = recommendations::approve(pool, id, actor)
        .await
        .map_err(map_core_error)?;
    Ok(Json(detail))
}

#[derive(Debug, Deserialize)]
struct RejectBody {
    approved_by: Option<String>,
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<RejectBody>>,
) -> Result<Json<recommendations::RecommendationDetail>, ApiError> {
    // No body required: the actor defaults to the authenticated identity
    // forwarded by the gateway.
    let from_body = body.and_then(|Json(b)| b.approved_by);
    let from_header = headers
        .get("x-actor-email")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let actor = from_body
        .or(from_header)
        .ok_or_else(|| bad_request("no actor: provide approved_by or x-actor-email"))?;
    let actor = validate_actor(&actor)?;
    let pool = require_pool(&state)?;

    let detail = recommendations::reject(pool, id, actor)
        .await
        .map_err(map_core_error)?;
    Ok(Json(detail))
}

fn validate_actor(actor: &str) -> Result<&str, ApiError> {
    let trimmed = actor.trim();
    if trimmed.is_empty() || !trimmed.contains('@') {
        return Err(bad_request(format!(
            "actor must be an email address (got {actor:?})"
        )));
    }
    Ok(trimmed)
}

async fn report_data(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<Vec<recommendations::ReportRecommendation>>, ApiError> {
    let pool = require_pool(&state)?;
    let rows = recommendations::list_for_report(pool, analysis_id)
        .await
        .map_err(map_core_error)?;
    Ok(Json(rows))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &treasury_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn test_app() -> Router {
        router(AppState { pool: None })
    }

    async fn body_string(res: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn healthz_works_without_db() {
        let res = test_app()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn generate_rejects_out_of_range_criteria_before_touching_storage() {
        let req = Request::post("/recommendations/generate")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"analysis_id": "00000000-0000-0000-0000-000000000001", "max_recommendations": 25}"#,
            ))
            .unwrap();

        let res = test_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(res).await.contains("max_recommendations"));
    }

    #[tokio::test]
    async fn generate_without_analysis_id_is_bad_request() {
        let req = Request::post("/recommendations/generate")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"max_recommendations": 5}"#))
            .unwrap();

        let res = test_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(res).await.contains("analysis_id is required"));
    }

    #[tokio::test]
    async fn generate_rejects_unknown_min_priority() {
        let req = Request::post("/recommendations/generate")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"analysis_id": "00000000-0000-0000-0000-000000000001", "min_priority": "urgent"}"#,
            ))
            .unwrap();

        let res = test_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_without_db_is_service_unavailable() {
        let req = Request::post("/recommendations/generate")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"analysis_id": "00000000-0000-0000-0000-000000000001"}"#,
            ))
            .unwrap();

        let res = test_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn list_rejects_unknown_filter_enums() {
        let res = test_app()
            .oneshot(
                Request::get("/recommendations?status=archived")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = test_app()
            .oneshot(
                Request::get("/recommendations?sort_by=rationale")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn approve_requires_email_formatted_actor() {
        let req = Request::put("/recommendations/00000000-0000-0000-0000-000000000001/approve")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"approved_by": "not-an-email"}"#))
            .unwrap();

        let res = test_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reject_without_actor_is_bad_request() {
        let req = Request::put("/recommendations/00000000-0000-0000-0000-000000000001/reject")
            .body(Body::empty())
            .unwrap();

        let res = test_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reject_takes_actor_from_header() {
        // With a valid actor the handler proceeds to the pool check, which is
        // degraded in tests.
        let req = Request::put("/recommendations/00000000-0000-0000-0000-000000000001/reject")
            .header("x-actor-email", "ops@example.com")
            .body(Body::empty())
            .unwrap();

        let res = test_app().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
