//! Pipeline configuration.
//!
//! All environment reads happen here, once, at process start. Components
//! receive the resulting structs by reference and never touch the process
//! environment themselves.

use std::path::PathBuf;

use thiserror::Error;

/// Default Postgres port (matches the docker-compose mapping this project ships with).
const DEFAULT_PG_PORT: u16 = 5433;

/// Schema namespace all pipeline tables live under.
pub const DEFAULT_SCHEMA: &str = "analytics_engineering";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
}

/// Connection settings for the relational store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Schema namespace for all pipeline tables.
    pub schema: String,
}

/// Settings for the language-model service.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
}

/// File locations the stages read from and write to.
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// DDL script run by the schema provisioner.
    pub ddl_script: PathBuf,
    /// Multi-statement report script.
    pub report_script: PathBuf,
    /// Directory containing the raw CSV inputs.
    pub data_dir: PathBuf,
    /// Output artifact for generated insights.
    pub insights_out: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            ddl_script: "sql/schema.sql".into(),
            report_script: "sql/report.sql".into(),
            data_dir: "data/raw".into(),
            insights_out: "data/outputs/insights.csv".into(),
        }
    }
}

/// Top-level configuration, constructed once and passed down by reference.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub paths: PathConfig,
}

impl PipelineConfig {
    /// Build from the process environment.
    ///
    /// `POSTGRES_USER`, `POSTGRES_PASSWORD`, and `POSTGRES_DB` are required.
    /// Everything else has a sensible default for a local single-machine run.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store = StoreConfig {
            host: env_or("POSTGRES_HOST", "localhost"),
            port: match std::env::var("POSTGRES_PORT") {
                Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidVar {
                    name: "POSTGRES_PORT",
                    value: raw,
                })?,
                Err(_) => DEFAULT_PG_PORT,
            },
            user: required("POSTGRES_USER")?,
            password: required("POSTGRES_PASSWORD")?,
            database: required("POSTGRES_DB")?,
            schema: env_or("PIPELINE_SCHEMA", DEFAULT_SCHEMA),
        };

        let llm = LlmConfig {
            base_url: env_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            model: env_or("OLLAMA_MODEL", "llama3"),
        };

        Ok(Self {
            store,
            llm,
            paths: PathConfig::default(),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
