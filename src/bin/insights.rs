#![forbid(unsafe_code)]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use purchase_insights::config::PipelineConfig;
use purchase_insights::pipeline::{
    self, InsightStage, LoadStage, ProvisionStage, ReportStage, RunOutcome, Stage,
};
use purchase_insights::store::Store;

#[derive(Parser)]
#[command(name = "insights", version, about = "Purchase analytics pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: provision, load, report, insights
    Run,
    /// Provision the analytics schema from the DDL script
    Provision,
    /// Bulk-load the raw CSV files into the base tables
    Load,
    /// Run the report script and print its rows
    Report,
    /// Generate per-customer insights and write the CSV artifact
    Insights,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    match cli.command {
        Commands::Run => {
            let stages = pipeline::standard_stages(&config);
            let report = pipeline::run_pipeline(&stages).await;
            match report.outcome {
                RunOutcome::Succeeded => {
                    println!("Pipeline executed successfully.");
                    ExitCode::SUCCESS
                }
                RunOutcome::Failed { stage, error, .. } => {
                    eprintln!("Pipeline failed at stage `{stage}`: {error}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Provision => {
            run_single(ProvisionStage {
                store: Store::new(&config.store),
                config: config.clone(),
            })
            .await
        }
        Commands::Load => {
            run_single(LoadStage {
                store: Store::new(&config.store),
                config: config.clone(),
            })
            .await
        }
        Commands::Report => {
            run_single(ReportStage {
                store: Store::new(&config.store),
                config: config.clone(),
            })
            .await
        }
        Commands::Insights => {
            run_single(InsightStage {
                store: Store::new(&config.store),
                config: config.clone(),
            })
            .await
        }
    }
}

async fn run_single(stage: impl Stage) -> ExitCode {
    match stage.run().await {
        Ok(()) => {
            println!("Stage `{}` executed successfully.", stage.name());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Stage `{}` failed: {err}", stage.name());
            ExitCode::FAILURE
        }
    }
}
