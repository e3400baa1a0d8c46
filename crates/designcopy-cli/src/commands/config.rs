//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use designcopy_core::config::AppConfig;
use designcopy_core::error::AppError;
use designcopy_engine::{RenameResolver, ReplicationRequest};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration
    Validate,
    /// Generate a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config/generated.toml")]
        output: String,
    },
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config: &AppConfig,
    config_path: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => match format {
            OutputFormat::Json => output::print_json(config),
            OutputFormat::Table => println!("{:#?}", config),
        },
        ConfigCommand::Validate => {
            // Loading validates the schema; descriptor patterns compile here.
            let replication = &config.replication;
            let sample = ReplicationRequest::new(".", ".", "sample");
            RenameResolver::new(&sample, replication)?;

            let source = config_path.unwrap_or("config/default.toml");
            output::print_success(&format!("Configuration '{}' is valid", source));
            output::print_kv("Log level", &config.logging.level);
            output::print_kv("Log format", &config.logging.format);
            output::print_kv("Assembly extension", &replication.assembly_extension);
            output::print_kv("Descriptor extension", &replication.descriptor_extension);
            output::print_kv("Template top assembly", &replication.template_top_assembly);
            output::print_kv(
                "Excluded subtrees",
                &replication.excluded_subtrees.len().to_string(),
            );
            output::print_kv(
                "Fallback descriptor",
                &replication
                    .fallback_descriptor_template
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "none".to_string()),
            );
            output::print_kv(
                "Descriptor patterns",
                &replication.descriptor_patterns.len().to_string(),
            );
        }
        ConfigCommand::Generate { output: out_path } => {
            let default_config = include_str!("../../../../config/default.toml");

            if let Some(parent) = std::path::Path::new(out_path).parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| AppError::internal(format!("Failed to create dir: {}", e)))?;
            }

            tokio::fs::write(out_path, default_config)
                .await
                .map_err(|e| AppError::internal(format!("Failed to write config: {}", e)))?;

            output::print_success(&format!("Default config written to '{}'", out_path));
        }
    }

    Ok(())
}
