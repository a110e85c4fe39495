use crate::domain::product::{
    EligibilityRule, ProductBenefits, ProductPricing, TreasuryProduct,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

type ProductRow = (
    Uuid,
    String,
    String,
    String,
    Vec<String>,
    Value,
    Value,
    Value,
    bool,
    DateTime<Utc>,
);

/// Candidate products for scoring. Inactive products are excluded unless
/// asked for; a non-empty category set restricts the result. Catalog order
/// is name-ascending, which the engine re-ranks anyway.
pub async fn list_candidate_products(
    pool: &sqlx::PgPool,
    include_inactive: bool,
    category_filters: &[String],
) -> anyhow::Result<Vec<TreasuryProduct>> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, category, description, features, eligibility_rules, \
                benefits, pricing, is_active, created_at \
         FROM treasury_products \
         WHERE (is_active OR $1 = TRUE) \
           AND (cardinality($2::text[]) = 0 OR category = ANY($2)) \
         ORDER BY name ASC",
    )
    .bind(include_inactive)
    .bind(category_filters)
    .fetch_all(pool)
    .await
    .context("select treasury_products failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(product_from_row(row)?);
    }
    Ok(out)
}

fn product_from_row(row: ProductRow) -> anyhow::Result<TreasuryProduct> {
    let (id, name, category, description, features, rules, benefits, pricing, is_active, created_at) =
        row;

    // Unknown rule kinds must fail loudly rather than silently weakening the
    // eligibility check.
    let eligibility_rules: Vec<EligibilityRule> = serde_json::from_value(rules)
        .with_context(|| format!("bad eligibility_rules json (product={id})"))?;
    let benefits: ProductBenefits = serde_json::from_value(benefits)
        .with_context(|| format!("bad benefits json (product={id})"))?;
    let pricing: ProductPricing = serde_json::from_value(pricing)
        .with_context(|| format!("bad pricing json (product={id})"))?;

    Ok(TreasuryProduct {
        id,
        name,
        category,
        description,
        features,
        eligibility_rules,
        benefits,
        pricing,
        is_active,
        created_at,
    })
}

/// Catalog entry as seeded by the operator CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub eligibility_rules: Vec<EligibilityRule>,
    pub benefits: ProductBenefits,
    pub pricing: ProductPricing,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

pub async fn insert_product(pool: &sqlx::PgPool, product: &NewProduct) -> anyhow::Result<Uuid> {
    let rules = serde_json::to_value(&product.eligibility_rules)
        .context("serialize eligibility_rules failed")?;
    let benefits =
        serde_json::to_value(&product.benefits).context("serialize benefits failed")?;
    let pricing = serde_json::to_value(&product.pricing).context("serialize pricing failed")?;

    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO treasury_products \
           (name, category, description, features, eligibility_rules, benefits, pricing, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING id",
    )
    .bind(&product.name)
    .bind(&product.category)
    .bind(&product.description)
    .bind(&product.features)
    .bind(rules)
    .bind(benefits)
    .bind(pricing)
    .bind(product.is_active)
    .fetch_one(pool)
    .await
    .context("insert treasury_products failed")?;

    Ok(id)
}
