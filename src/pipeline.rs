//! Pipeline orchestration.
//!
//! Stages run strictly in sequence as in-process units behind the [`Stage`]
//! trait. The first stage that fails stops the run; later stages are never
//! attempted and earlier stages' effects are not rolled back. There is no
//! retry and no persisted run history.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::gateway::{LlmError, OllamaAdapter};
use crate::insights::{generate_insights, InsightError};
use crate::loader::{load_all, LoadItem};
use crate::report::{run_report, ReportError};
use crate::schema::{provision, ProvisionError};
use crate::store::Store;

/// Any failure a stage can surface.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("provision: {0}")]
    Provision(#[from] ProvisionError),
    #[error("load: {failed} of {total} items failed")]
    Load { failed: usize, total: usize },
    #[error("report: {0}")]
    Report(#[from] ReportError),
    #[error("insights: {0}")]
    Insight(#[from] InsightError),
    #[error("gateway: {0}")]
    Gateway(#[from] LlmError),
}

/// One independently executable unit of pipeline work.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self) -> Result<(), PipelineError>;
}

/// Terminal status of a run.
#[derive(Debug)]
pub enum RunOutcome {
    Succeeded,
    Failed {
        index: usize,
        stage: &'static str,
        error: PipelineError,
    },
}

/// Result of one pipeline run: which stages completed, and how it ended.
#[derive(Debug)]
pub struct RunReport {
    pub completed: Vec<&'static str>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded)
    }
}

/// Execute the stages in order, stopping at the first failure.
pub async fn run_pipeline(stages: &[Box<dyn Stage>]) -> RunReport {
    let mut completed = Vec::with_capacity(stages.len());

    for (index, stage) in stages.iter().enumerate() {
        info!(stage = stage.name(), index, "stage starting");
        match stage.run().await {
            Ok(()) => {
                info!(stage = stage.name(), "stage succeeded");
                completed.push(stage.name());
            }
            Err(err) => {
                error!(stage = stage.name(), %err, "stage failed, aborting run");
                return RunReport {
                    completed,
                    outcome: RunOutcome::Failed {
                        index,
                        stage: stage.name(),
                        error: err,
                    },
                };
            }
        }
    }

    RunReport {
        completed,
        outcome: RunOutcome::Succeeded,
    }
}

// =============================================================================
// Concrete stages
// =============================================================================

pub struct ProvisionStage {
    pub store: Store,
    pub config: PipelineConfig,
}

#[async_trait]
impl Stage for ProvisionStage {
    fn name(&self) -> &'static str {
        "provision"
    }

    async fn run(&self) -> Result<(), PipelineError> {
        provision(&self.store, &self.config.paths.ddl_script).await?;
        Ok(())
    }
}

pub struct LoadStage {
    pub store: Store,
    pub config: PipelineConfig,
}

impl LoadStage {
    /// The three raw files this pipeline ingests, one per base table.
    pub fn default_items(config: &PipelineConfig) -> Vec<LoadItem> {
        let schema = &config.store.schema;
        let dir = &config.paths.data_dir;
        ["customers", "products", "purchases"]
            .iter()
            .map(|table| LoadItem::new(dir.join(format!("{table}.csv")), *table, schema.clone()))
            .collect()
    }
}

#[async_trait]
impl Stage for LoadStage {
    fn name(&self) -> &'static str {
        "load"
    }

    /// Items are isolated from each other, but if every item fails the
    /// stage itself fails: nothing was loaded and later stages would only
    /// report on an empty schema.
    async fn run(&self) -> Result<(), PipelineError> {
        let items = Self::default_items(&self.config);
        let reports = load_all(&self.store, &items).await;

        let failed = reports.iter().filter(|r| r.result.is_err()).count();
        if failed == reports.len() && !reports.is_empty() {
            return Err(PipelineError::Load {
                failed,
                total: reports.len(),
            });
        }
        Ok(())
    }
}

pub struct ReportStage {
    pub store: Store,
    pub config: PipelineConfig,
}

#[async_trait]
impl Stage for ReportStage {
    fn name(&self) -> &'static str {
        "report"
    }

    async fn run(&self) -> Result<(), PipelineError> {
        run_report(&self.store, &self.config.paths.report_script).await?;
        Ok(())
    }
}

pub struct InsightStage {
    pub store: Store,
    pub config: PipelineConfig,
}

#[async_trait]
impl Stage for InsightStage {
    fn name(&self) -> &'static str {
        "insights"
    }

    async fn run(&self) -> Result<(), PipelineError> {
        let gateway = OllamaAdapter::new(&self.config.llm.base_url)?;
        generate_insights(
            &self.store,
            &gateway,
            &self.config.store.schema,
            &self.config.llm.model,
            &self.config.paths.insights_out,
        )
        .await?;
        Ok(())
    }
}

/// Build the standard four-stage pipeline.
pub fn standard_stages(config: &PipelineConfig) -> Vec<Box<dyn Stage>> {
    let store = Store::new(&config.store);
    vec![
        Box::new(ProvisionStage {
            store: store.clone(),
            config: config.clone(),
        }),
        Box::new(LoadStage {
            store: store.clone(),
            config: config.clone(),
        }),
        Box::new(ReportStage {
            store: store.clone(),
            config: config.clone(),
        }),
        Box::new(InsightStage {
            store,
            config: config.clone(),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::config::{LlmConfig, PathConfig, StoreConfig};

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            store: StoreConfig {
                host: "localhost".into(),
                port: 5433,
                user: "u".into(),
                password: "p".into(),
                database: "d".into(),
                schema: "analytics_engineering".into(),
            },
            llm: LlmConfig {
                base_url: "http://localhost:11434".into(),
                model: "llama3".into(),
            },
            paths: PathConfig::default(),
        }
    }

    #[test]
    fn default_items_cover_all_base_tables() {
        let items = LoadStage::default_items(&test_config());
        let tables: Vec<&str> = items.iter().map(|i| i.table.as_str()).collect();
        assert_eq!(tables, vec!["customers", "products", "purchases"]);
        assert_eq!(items[0].path, PathBuf::from("data/raw/customers.csv"));
        assert!(items.iter().all(|i| i.schema == "analytics_engineering"));
    }

    #[test]
    fn standard_pipeline_has_four_stages_in_order() {
        let stages = standard_stages(&test_config());
        let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["provision", "load", "report", "insights"]);
    }
}
