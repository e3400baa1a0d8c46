//! CLI command definitions and dispatch.

pub mod config;
pub mod plan;
pub mod replicate;
pub mod resolve;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use validator::Validate;

use crate::output::OutputFormat;
use designcopy_core::config::{AppConfig, ReplicationConfig};
use designcopy_core::error::AppError;
use designcopy_core::traits::AuthoringEngine;
use designcopy_engine::{
    EngineSession, FileRename, ManifestEngine, ModuleMetadata, ModuleNumber, Orchestrator,
    ProjectSource, RenameDirectives, ReplicationRequest,
};

/// DesignCopy: replicate CAD design trees under a new project identity
#[derive(Debug, Parser)]
#[command(name = "designcopy", version, about, long_about = None)]
pub struct Cli {
    /// Explicit configuration file, merged over config/default.toml
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replicate a design tree
    Replicate(replicate::ReplicateArgs),
    /// Show what a replication would do without writing anything
    Plan(plan::PlanArgs),
    /// Preview the destination name of a file
    Resolve(resolve::ResolveArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, app_config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Replicate(args) => replicate::execute(args, &app_config, self.format).await,
            Commands::Plan(args) => plan::execute(args, &app_config, self.format).await,
            Commands::Resolve(args) => resolve::execute(args, &app_config, self.format).await,
            Commands::Config(args) => {
                config::execute(args, &app_config, self.config.as_deref(), self.format).await
            }
        }
    }
}

/// Options describing one replication request
#[derive(Debug, Clone, Default, Args)]
pub struct RequestArgs {
    /// JSON request file; every other request option is ignored when set
    #[arg(long)]
    pub request: Option<PathBuf>,

    /// Source root of the design tree
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Destination root
    #[arg(long)]
    pub destination: Option<PathBuf>,

    /// Base folder; with a module number the destination becomes
    /// BASE/PROJECT/REFrr/Mmm
    #[arg(long)]
    pub base: Option<PathBuf>,

    /// New project identity (defaults to the full module number)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Project number (4 to 6 digits)
    #[arg(long)]
    pub project: Option<String>,

    /// Reference number
    #[arg(long)]
    pub reference: Option<String>,

    /// Module number
    #[arg(long)]
    pub module: Option<String>,

    /// Top assembly, relative to the source root
    #[arg(long)]
    pub top_assembly: Option<PathBuf>,

    /// The source is an existing project rather than a template
    #[arg(long)]
    pub existing_project: bool,

    /// Prefix added to every renamed file stem
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Suffix added to every renamed file stem
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Text replaced in every file stem
    #[arg(long)]
    pub search: Option<String>,

    /// Replacement for --search
    #[arg(long, default_value = "")]
    pub replace: String,

    /// Explicit rename, ORIGINAL=NEW (repeatable); ORIGINAL is a path or a
    /// bare file name
    #[arg(long = "rename", value_name = "ORIGINAL=NEW")]
    pub renames: Vec<String>,

    /// Designer initials stamped on the new top assembly
    #[arg(long)]
    pub designer: Option<String>,

    /// Co-designer initials
    #[arg(long)]
    pub co_designer: Option<String>,

    /// Job title
    #[arg(long)]
    pub job_title: Option<String>,

    /// Creation date, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

impl RequestArgs {
    /// Module number, when any of its parts was given.
    fn module_number(&self) -> Result<Option<ModuleNumber>, AppError> {
        match (&self.project, &self.reference, &self.module) {
            (None, None, None) => Ok(None),
            (Some(project), Some(reference), Some(module)) => {
                let number = ModuleNumber::new(project.trim(), reference.trim(), module.trim());
                number.validate()?;
                Ok(Some(number))
            }
            _ => Err(AppError::validation(
                "--project, --reference and --module must be given together",
            )),
        }
    }
}

/// Build a request from a JSON file or from flags.
pub async fn build_request(args: &RequestArgs) -> Result<ReplicationRequest, AppError> {
    if let Some(path) = &args.request {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::not_found(format!("Cannot read request {}: {}", path.display(), e))
        })?;
        let request: ReplicationRequest = serde_json::from_str(&raw)?;
        request.validate()?;
        return Ok(request);
    }

    let source = args
        .source
        .clone()
        .ok_or_else(|| AppError::validation("--source is required without --request"))?;
    let number = args.module_number()?;

    let project_id = match (&args.project_id, &number) {
        (Some(id), _) => id.trim().to_string(),
        (None, Some(number)) => number.full(),
        (None, None) => {
            return Err(AppError::validation(
                "--project-id or a module number is required",
            ));
        }
    };

    let destination = match (&args.destination, &number, &args.base) {
        (Some(destination), _, _) => destination.clone(),
        (None, Some(number), Some(base)) => number.destination_under(base),
        _ => {
            return Err(AppError::validation(
                "--destination, or --base with a module number, is required",
            ));
        }
    };

    let mut request = ReplicationRequest::new(source, destination, project_id);
    request.top_assembly = args.top_assembly.clone();
    if args.existing_project {
        request.source_kind = ProjectSource::ExistingProject;
    }
    request.renames = RenameDirectives {
        overrides: parse_renames(&args.renames)?,
        prefix: args.prefix.clone(),
        suffix: args.suffix.clone(),
        search: args.search.clone().filter(|s| !s.is_empty()),
        replace: args.replace.clone(),
    };

    if let Some(number) = number {
        let metadata = ModuleMetadata {
            number,
            designer: args.designer.clone().unwrap_or_default(),
            co_designer: args.co_designer.clone().unwrap_or_default(),
            creation_date: args
                .date
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
            job_title: args.job_title.clone(),
        };
        request.metadata = metadata.standard();
    }

    request.validate()?;
    Ok(request)
}

fn parse_renames(raw: &[String]) -> Result<Vec<FileRename>, AppError> {
    raw.iter()
        .map(|entry| {
            let (original, new_name) = entry.split_once('=').ok_or_else(|| {
                AppError::validation(format!("Invalid rename '{}', expected ORIGINAL=NEW", entry))
            })?;
            if original.trim().is_empty() || new_name.trim().is_empty() {
                return Err(AppError::validation(format!("Invalid rename '{}'", entry)));
            }
            Ok(FileRename {
                original_path: PathBuf::from(original.trim()),
                new_file_name: new_name.trim().to_string(),
            })
        })
        .collect()
}

/// Start an engine session and wrap it in an orchestrator.
pub async fn spawn_orchestrator(config: &ReplicationConfig) -> Result<Orchestrator, AppError> {
    let session = EngineSession::spawn(|| {
        Ok(Box::new(ManifestEngine::new()) as Box<dyn AuthoringEngine>)
    })
    .await?;
    tracing::debug!(engine = session.engine_name(), "Engine session started");
    Ok(Orchestrator::new(session, config.clone()))
}
