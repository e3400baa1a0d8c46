//! Replication CLI command.

use clap::Args;
use dialoguer::Confirm;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use super::RequestArgs;
use crate::output::{self, OutputFormat};
use designcopy_core::config::AppConfig;
use designcopy_core::error::AppError;
use designcopy_engine::{
    CallbackProgress, ReplicationRequest, ReplicationResult, destination_is_populated,
};

/// Arguments for the replicate command
#[derive(Debug, Args)]
pub struct ReplicateArgs {
    /// Request options
    #[command(flatten)]
    pub request: RequestArgs,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Copy record display row
#[derive(Debug, Serialize, Tabled)]
struct RecordRow {
    /// Phase
    phase: String,
    /// Status
    status: String,
    /// Original
    original: String,
    /// New
    new: String,
}

/// Execute the replicate command
pub async fn execute(
    args: &ReplicateArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let request = super::build_request(&args.request).await?;
    describe(&request);

    if destination_is_populated(&request.destination_root).await {
        output::print_warning(&format!(
            "Destination '{}' is not empty; existing files may be overwritten",
            request.destination_root.display()
        ));
    }

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Start replication?")
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Prompt failed: {}", e)))?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let orchestrator = super::spawn_orchestrator(&config.replication).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let quiet = args.quiet;
    let sink = CallbackProgress::new(
        move |percent, message: &str| {
            if !quiet {
                output::print_progress(percent, message);
            }
        },
        move |message: &str, severity| output::print_log(message, severity, quiet),
    );

    let outcome = orchestrator.execute(request, &sink, cancel).await;
    if let Err(e) = orchestrator.shutdown().await {
        tracing::warn!(error = %e, "Engine session did not shut down cleanly");
    }
    let result = outcome?;

    match format {
        OutputFormat::Json => output::print_json(&result),
        OutputFormat::Table => print_result(&result),
    }

    if result.success {
        Ok(())
    } else {
        Err(AppError::internal(
            result
                .error_message
                .unwrap_or_else(|| "No files were copied".to_string()),
        ))
    }
}

fn describe(request: &ReplicationRequest) {
    println!("Replication request:");
    output::print_kv("Source", &request.source_root.display().to_string());
    output::print_kv("Destination", &request.destination_root.display().to_string());
    output::print_kv("Project", &request.project_id);
    if let Some(top) = &request.top_assembly {
        output::print_kv("Top assembly", &top.display().to_string());
    }
    output::print_kv("Renames", &request.renames.overrides.len().to_string());
    output::print_kv("Metadata stamps", &request.metadata.len().to_string());
}

fn print_result(result: &ReplicationResult) {
    let rows: Vec<RecordRow> = result
        .records
        .iter()
        .map(|r| RecordRow {
            phase: r.phase.to_string(),
            status: output::status_mark(r.success),
            original: r.original_path.display().to_string(),
            new: output::display_under(&r.new_path, &result.destination_path),
        })
        .collect();
    output::print_list(&rows, OutputFormat::Table);

    println!();
    output::print_kv("Run", &result.run_id.to_string());
    output::print_kv("State", &result.final_state.to_string());
    output::print_kv("Copied", &result.files_copied.to_string());
    output::print_kv("Failed", &result.files_failed.to_string());
    output::print_kv("Skipped", &result.files_skipped.to_string());
    output::print_kv("Properties", &result.properties_updated.to_string());
    if let Some(top) = &result.top_assembly_path {
        output::print_kv("Top assembly", &top.display().to_string());
    }
    output::print_kv(
        "Duration",
        &format!(
            "{} ms",
            (result.finished_at - result.started_at).num_milliseconds()
        ),
    );

    if result.success {
        output::print_success(&format!(
            "Replicated into '{}'",
            result.destination_path.display()
        ));
    }
}
