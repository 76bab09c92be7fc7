#![forbid(unsafe_code)]

//! # purchase-insights
//!
//! A linear, single-machine batch pipeline over a Postgres store:
//!
//! 1. **Provision** — run the DDL script that creates the analytics schema
//! 2. **Load** — bulk-append the raw CSV files into the base tables
//! 3. **Report** — run the multi-statement report script and print its rows
//! 4. **Insights** — aggregate purchase activity per customer and ask a
//!    local LLM for one natural-language insight per customer, persisted to
//!    a CSV artifact
//!
//! Stages run strictly in order; the first failure aborts the run. Each
//! database operation opens and closes its own connection scope.

pub mod config;
pub mod gateway;
pub mod insights;
pub mod loader;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod schema;
pub mod store;

pub use config::{PipelineConfig, DEFAULT_SCHEMA};
pub use gateway::{ChatGateway, ChatRequest, ChatResponse, LlmError, Message, OllamaAdapter};
pub use insights::{generate_insights, CustomerActivity};
pub use pipeline::{run_pipeline, standard_stages, PipelineError, RunOutcome, RunReport, Stage};
pub use store::{Store, StoreError};
