//! File name preview CLI command.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::RequestArgs;
use crate::output::{self, OutputFormat};
use designcopy_core::config::AppConfig;
use designcopy_core::error::AppError;
use designcopy_engine::{RenameResolver, ReplicationRequest};

/// Arguments for the resolve command
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// File names or paths to resolve
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Treat the files as the top assembly
    #[arg(long)]
    pub top: bool,

    /// Request options
    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Debug, Serialize)]
struct Resolution {
    original: String,
    resolved: String,
}

/// Execute the resolve command
pub async fn execute(
    args: &ResolveArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let request = preview_request(&args.request).await?;
    let resolver = RenameResolver::new(&request, &config.replication)?;

    let resolutions: Vec<Resolution> = args
        .files
        .iter()
        .map(|file| {
            let resolved = if file.parent().is_some_and(|p| !p.as_os_str().is_empty()) {
                resolver.resolve(file, args.top)
            } else if args.top {
                resolver.top_assembly_name()
            } else {
                resolver.resolve_name(&file.to_string_lossy())
            };
            Resolution {
                original: file.display().to_string(),
                resolved,
            }
        })
        .collect();

    match format {
        OutputFormat::Json => output::print_json(&resolutions),
        OutputFormat::Table => {
            for r in &resolutions {
                output::print_kv(&r.original, &r.resolved);
            }
        }
    }
    Ok(())
}

/// Resolution needs only the identity and rename directives, so source and
/// destination fall back to placeholders.
async fn preview_request(args: &RequestArgs) -> Result<ReplicationRequest, AppError> {
    let mut args = args.clone();
    if args.request.is_none() {
        args.source.get_or_insert_with(|| PathBuf::from("."));
        if args.base.is_none() {
            args.destination.get_or_insert_with(|| PathBuf::from("."));
        }
    }
    super::build_request(&args).await
}
