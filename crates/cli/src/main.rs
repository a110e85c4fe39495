use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use treasury_core::domain::recommendation::Priority;
use treasury_core::engine::{GenerationCriteria, ScoringConfig};
use treasury_core::recommend::{self, GenerationRequest};
use treasury_core::storage;

#[derive(Debug, Parser)]
#[command(name = "treasury_cli")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run pending database migrations.
    Migrate,

    /// Load treasury products into the catalog from a JSON file.
    SeedProducts {
        /// Path to a JSON array of products.
        #[arg(long)]
        file: std::path::PathBuf,
    },

    /// Generate recommendations for a completed analysis.
    Generate {
        #[arg(long)]
        analysis_id: Uuid,

        #[arg(long, default_value_t = 5)]
        max_recommendations: usize,

        /// Drop candidates scoring below this (0-10).
        #[arg(long)]
        priority_threshold: Option<f64>,

        /// Drop candidates below this ordinal priority (high|medium|low).
        #[arg(long)]
        min_priority: Option<String>,

        #[arg(long)]
        include_inactive: bool,

        /// Restrict to these product categories (repeatable).
        #[arg(long = "category")]
        categories: Vec<String>,

        /// Score and print, but do not persist.
        #[arg(long)]
        dry_run: bool,
    },
}

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

    let args = Args::parse();

    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    match args.command {
        Command::Migrate => {
            storage::migrate(&pool).await?;
            tracing::info!("migrations applied");
        }
        Command::SeedProducts { file } => {
            storage::migrate(&pool).await?;
            let count = seed_products(&pool, &file).await?;
            tracing::info!(count, file = %file.display(), "seeded treasury products");
        }
        Command::Generate {
            analysis_id,
            max_recommendations,
            priority_threshold,
            min_priority,
            include_inactive,
            categories,
            dry_run,
        } => {
            let min_priority = min_priority
                .as_deref()
                .map(|s| {
                    Priority::parse(s)
                        .with_context(|| format!("unknown min_priority: {s}"))
                })
                .transpose()?;

            let mut request = GenerationRequest::new(analysis_id);
            request.criteria = GenerationCriteria {
                max_recommendations,
                priority_threshold,
                min_priority,
            };
            request.include_inactive = include_inactive;
            request.category_filters = categories;
            request.criteria.validate()?;

            if dry_run {
                let analysis =
                    storage::analyses::load_completed_analysis(&pool, analysis_id).await?;
                let candidates = storage::products::list_candidate_products(
                    &pool,
                    request.include_inactive,
                    &request.category_filters,
                )
                .await?;
                let scored = treasury_core::engine::generate(
                    &analysis,
                    &candidates,
                    &request.criteria,
                    &ScoringConfig::default(),
                );
                for rec in &scored {
                    tracing::info!(
                        product = %rec.product_name,
                        priority = rec.priority.as_str(),
                        score = rec.score,
                        benefit = rec.projection.total_annual_benefit(),
                        "would recommend"
                    );
                }
                tracing::info!(%analysis_id, scored = scored.len(), dry_run = true, "nothing persisted");
                return Ok(());
            }

            let outcome = match recommend::generate_for_analysis(
                &pool,
                &request,
                &ScoringConfig::default(),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    sentry_anyhow::capture_anyhow(&err);
                    return Err(err);
                }
            };

            for rec in &outcome.created {
                tracing::info!(
                    recommendation_id = %rec.id,
                    priority = rec.priority.as_str(),
                    score = rec.score,
                    "created recommendation"
                );
            }
            tracing::info!(%analysis_id, created = outcome.created.len(), "generation complete");
        }
    }

    Ok(())
}

async fn seed_products(
    pool: &sqlx::PgPool,
    file: &std::path::Path,
) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("read {} failed", file.display()))?;
    let products: Vec<storage::products::NewProduct> =
        serde_json::from_str(&raw).context("parse product seed file failed")?;

    for product in &products {
        let id = storage::products::insert_product(pool, product).await?;
        tracing::info!(%id, name = %product.name, category = %product.category, "inserted product");
    }
    Ok(products.len())
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
