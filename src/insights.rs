//! Insight generation stage.
//!
//! Runs one aggregation query over customers, purchases, and products, then
//! walks the result rows in fetch order, asking the language model for one
//! insight per customer. The whole collection is written to the output
//! artifact only after every call has succeeded: a failure anywhere in the
//! loop aborts the stage and persists nothing.

use std::path::Path;

use sqlx::Row;
use thiserror::Error;
use tracing::{debug, info};

use crate::gateway::{ChatGateway, ChatRequest, LlmError};
use crate::prompts::INSIGHT_PROMPT;
use crate::store::{quote_ident, Store, StoreError};

#[derive(Debug, Error)]
pub enum InsightError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to decode aggregation row: {0}")]
    Decode(#[from] sqlx::Error),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write insights to {path}: {source}")]
    Artifact {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// One row of the aggregation query. Immutable once fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerActivity {
    pub name: String,
    pub total_purchases: i64,
    pub total_spent: f64,
}

/// Natural-language summary of one customer's activity, fed to the model.
pub fn activity_summary(activity: &CustomerActivity) -> String {
    format!(
        "Cliente {} fez {} compras totalizando ${:.2}.",
        activity.name, activity.total_purchases, activity.total_spent
    )
}

/// The fixed three-way join/aggregation: one row per customer with a count
/// of purchases and the summed price of the purchased products.
fn aggregation_query(schema: &str) -> String {
    let ns = quote_ident(schema);
    format!(
        "SELECT \
             c.name, \
             COUNT(p.purchase_id) AS total_purchases, \
             SUM(pr.price)::float8 AS total_spent \
         FROM {ns}.customers c \
         JOIN {ns}.purchases p ON c.customer_id = p.customer_id \
         JOIN {ns}.products pr ON p.product_id = pr.product_id \
         GROUP BY c.name \
         ORDER BY c.name"
    )
}

/// Fetch all aggregated records, fully materialized before the scope closes.
pub async fn fetch_activity(store: &Store, schema: &str) -> Result<Vec<CustomerActivity>, InsightError> {
    let rows = store.run_query(&aggregation_query(schema)).await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        records.push(CustomerActivity {
            name: row.try_get("name")?,
            total_purchases: row.try_get("total_purchases")?,
            total_spent: row.try_get("total_spent")?,
        });
    }
    Ok(records)
}

/// Generate one insight per record, strictly sequentially, in fetch order.
///
/// There is no per-record isolation: the first failed call propagates and
/// the insights accumulated so far are discarded with it.
pub async fn synthesize_insights(
    gateway: &dyn ChatGateway,
    model: &str,
    records: &[CustomerActivity],
) -> Result<Vec<String>, InsightError> {
    let mut insights = Vec::with_capacity(records.len());

    for record in records {
        let question = activity_summary(record);
        debug!(
            customer = %record.name,
            prompt = INSIGHT_PROMPT.slug,
            "requesting insight"
        );

        let response = gateway
            .chat(ChatRequest::new(model, INSIGHT_PROMPT.render(&question)))
            .await?;
        debug!(
            customer = %record.name,
            input_tokens = ?response.input_tokens,
            output_tokens = ?response.output_tokens,
            latency_ms = response.latency.as_millis() as u64,
            "insight received"
        );
        insights.push(response.content);
    }

    Ok(insights)
}

/// Write the full collection to `path`: a header row, then one row per
/// insight. Overwrites any prior artifact.
pub fn write_insights(path: &Path, insights: &[String]) -> Result<(), InsightError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| InsightError::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let display = path.display().to_string();
    let artifact = |source| InsightError::Artifact {
        path: display.clone(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(artifact)?;
    writer.write_record(["insight"]).map_err(artifact)?;
    for insight in insights {
        writer.write_record([insight]).map_err(artifact)?;
    }
    writer.flush().map_err(|e| artifact(e.into()))?;
    Ok(())
}

/// Generate and persist in one step. A failure in the generation loop
/// returns before the artifact is touched, so nothing partial is written.
pub async fn synthesize_and_write(
    gateway: &dyn ChatGateway,
    model: &str,
    records: &[CustomerActivity],
    out_path: &Path,
) -> Result<Vec<String>, InsightError> {
    let insights = synthesize_insights(gateway, model, records).await?;
    write_insights(out_path, &insights)?;
    Ok(insights)
}

/// Full stage: query, generate, persist.
pub async fn generate_insights(
    store: &Store,
    gateway: &dyn ChatGateway,
    schema: &str,
    model: &str,
    out_path: &Path,
) -> Result<Vec<String>, InsightError> {
    let records = fetch_activity(store, schema).await?;
    info!(customers = records.len(), "aggregated purchase activity");

    let insights = synthesize_and_write(gateway, model, &records, out_path).await?;

    info!(
        insights = insights.len(),
        artifact = %out_path.display(),
        "insights persisted"
    );
    Ok(insights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_formats_sum_to_two_decimals() {
        let summary = activity_summary(&CustomerActivity {
            name: "Ana".into(),
            total_purchases: 3,
            total_spent: 45.678,
        });
        assert_eq!(summary, "Cliente Ana fez 3 compras totalizando $45.68.");
    }

    #[test]
    fn summary_pads_whole_amounts() {
        let summary = activity_summary(&CustomerActivity {
            name: "Bruno".into(),
            total_purchases: 1,
            total_spent: 10.0,
        });
        assert_eq!(summary, "Cliente Bruno fez 1 compras totalizando $10.00.");
    }

    #[test]
    fn aggregation_query_targets_the_namespace() {
        let sql = aggregation_query("analytics_engineering");
        assert!(sql.contains("\"analytics_engineering\".customers"));
        assert!(sql.contains("\"analytics_engineering\".purchases"));
        assert!(sql.contains("\"analytics_engineering\".products"));
        assert!(sql.contains("GROUP BY c.name"));
        assert!(sql.contains("SUM(pr.price)::float8"));
    }
}
