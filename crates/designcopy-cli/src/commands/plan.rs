//! Dry-run planning CLI command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::RequestArgs;
use crate::output::{self, OutputFormat};
use designcopy_core::config::AppConfig;
use designcopy_core::error::AppError;
use designcopy_engine::models::PlannedCopy;

/// Arguments for the plan command
#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Request options
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Planned copy display row
#[derive(Debug, Serialize, Tabled)]
struct PlanRow {
    /// Order
    order: usize,
    /// Kind
    kind: String,
    /// Priority
    priority: String,
    /// Original
    original: String,
    /// New
    new: String,
}

/// Execute the plan command
pub async fn execute(
    args: &PlanArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let request = super::build_request(&args.request).await?;
    let orchestrator = super::spawn_orchestrator(&config.replication).await?;

    let outcome = orchestrator.plan(&request).await;
    if let Err(e) = orchestrator.shutdown().await {
        tracing::warn!(error = %e, "Engine session did not shut down cleanly");
    }
    let plan = outcome?;

    if format == OutputFormat::Json {
        output::print_json(&plan);
        return Ok(());
    }

    let rows: Vec<PlanRow> = plan
        .graph
        .iter()
        .chain(plan.drawings.iter())
        .enumerate()
        .map(|(i, p)| row(i + 1, p))
        .collect();
    output::print_list(&rows, format);

    println!();
    output::print_kv("Top assembly", &plan.top_assembly.display().to_string());
    output::print_kv("Graph documents", &plan.graph.len().to_string());
    output::print_kv("Drawings", &plan.drawings.len().to_string());
    output::print_kv("External (kept)", &plan.external.len().to_string());
    for path in &plan.external {
        println!("    {}", path.display());
    }
    Ok(())
}

fn row(order: usize, planned: &PlannedCopy) -> PlanRow {
    let priority = match planned.priority {
        Some(p) if planned.is_top_assembly => format!("{} (top)", p),
        Some(p) => p.to_string(),
        None => "-".to_string(),
    };
    PlanRow {
        order,
        kind: planned.kind.to_string(),
        priority,
        original: planned.original_path.display().to_string(),
        new: planned.new_path.display().to_string(),
    }
}
