//! Workspace descriptor handling: activating the source descriptor before
//! replication, relocating it afterwards, and restoring the caller's
//! original context on failure.

use std::path::{Path, PathBuf};

use crate::context::RunContext;
use crate::error::ReplicationError;
use crate::filesystem::FsUtils;
use crate::ledger::CopyLedger;
use crate::models::{CopyPhase, CopyRecord};
use crate::progress::RunReporter;
use crate::session::EngineSession;

/// What `prepare` found and changed.
#[derive(Debug, Clone, Default)]
pub struct WorkspacePreparation {
    /// Context active before the run.
    pub original_context: Option<PathBuf>,
    /// Descriptor of the source tree, if any.
    pub source_descriptor: Option<PathBuf>,
    /// Whether the active context was switched.
    pub switched: bool,
}

/// Relocates the workspace descriptor and manages the active context.
pub struct WorkspaceRelocator;

impl WorkspaceRelocator {
    /// Locate the source descriptor: the primary descriptor at the source
    /// root, else any descriptor at the root, else the first one found
    /// deeper in the tree.
    pub async fn locate_source_descriptor(
        ctx: &RunContext<'_>,
    ) -> Result<Option<PathBuf>, ReplicationError> {
        let ext = &ctx.config.descriptor_extension;
        let top_level = FsUtils::files_with_extension(ctx.source_root(), ext).await?;

        if let Some(primary) = top_level
            .iter()
            .find(|p| ctx.resolver.is_workspace_descriptor(p))
        {
            return Ok(Some(primary.clone()));
        }
        if let Some(first) = top_level.into_iter().next() {
            return Ok(Some(first));
        }

        Ok(FsUtils::collect_files(ctx.source_root(), &ctx.filter)
            .await?
            .into_iter()
            .find(|p| FsUtils::has_extension(p, ext)))
    }

    /// Remember the active context, close everything, and activate the
    /// source descriptor so references resolve as authored. Context
    /// failures are warnings.
    pub async fn prepare(
        ctx: &RunContext<'_>,
        reporter: &mut RunReporter<'_>,
    ) -> Result<WorkspacePreparation, ReplicationError> {
        let mut prep = WorkspacePreparation {
            source_descriptor: Self::locate_source_descriptor(ctx).await?,
            ..Default::default()
        };

        match ctx.session.active_workspace_context().await {
            Ok(original) => prep.original_context = original,
            Err(e) if e.aborts_batch() => return Err(e),
            Err(e) => reporter.warning(format!("Cannot read active workspace: {e}")),
        }

        let Some(descriptor) = prep.source_descriptor.clone() else {
            reporter.warning("No workspace descriptor found in the source tree");
            return Ok(prep);
        };

        if prep
            .original_context
            .as_deref()
            .is_some_and(|current| FsUtils::same_path(current, &descriptor))
        {
            reporter.info(format!("Workspace already active: {}", descriptor.display()));
            return Ok(prep);
        }

        match Self::activate(ctx.session, &descriptor).await {
            Ok(()) => {
                prep.switched = true;
                reporter.info(format!("Activated workspace {}", descriptor.display()));
            }
            Err(e) if e.aborts_batch() => return Err(e),
            Err(e) => reporter.warning(e.to_string()),
        }
        Ok(prep)
    }

    /// Create the destination root and every source sub-directory that is
    /// not excluded.
    pub async fn create_skeleton(
        ctx: &RunContext<'_>,
        reporter: &mut RunReporter<'_>,
    ) -> Result<usize, ReplicationError> {
        tokio::fs::create_dir_all(ctx.destination_root()).await?;
        let dirs = FsUtils::collect_dirs(ctx.source_root(), &ctx.filter).await?;

        let mut created = 0;
        for dir in &dirs {
            let Some(relative) = dir
                .strip_prefix(ctx.source_root())
                .ok()
                .map(Path::to_path_buf)
            else {
                continue;
            };
            tokio::fs::create_dir_all(ctx.destination_root().join(relative)).await?;
            created += 1;
        }

        reporter.info(format!("Created {created} destination folder(s)"));
        Ok(created)
    }

    /// Copy the primary descriptor to the destination root under its
    /// resolved name, or clone the fallback template when the source has
    /// none, then activate it. Returns the new descriptor.
    pub async fn relocate(
        ctx: &RunContext<'_>,
        ledger: &mut CopyLedger,
        reporter: &mut RunReporter<'_>,
    ) -> Result<Option<PathBuf>, ReplicationError> {
        let primary = FsUtils::files_with_extension(ctx.source_root(), &ctx.config.descriptor_extension)
            .await?
            .into_iter()
            .find(|p| ctx.resolver.is_workspace_descriptor(p));

        let (source, destination) = match primary {
            Some(source) => {
                let destination = ctx
                    .destination_root()
                    .join(ctx.resolver.resolve(&source, false));
                (source, destination)
            }
            None => match Self::fallback_template(ctx).await? {
                Some(template) => {
                    reporter.info(format!(
                        "No workspace descriptor in source, cloning template {}",
                        template.display()
                    ));
                    let destination = ctx
                        .destination_root()
                        .join(ctx.resolver.descriptor_name());
                    (template, destination)
                }
                None => {
                    reporter.warning(
                        "No workspace descriptor in source and no usable fallback template",
                    );
                    return Ok(None);
                }
            },
        };

        if let Err(e) = FsUtils::copy_file(&source, &destination).await {
            reporter.warning(
                ReplicationError::Copy {
                    path: source.clone(),
                    reason: e.to_string(),
                }
                .to_string(),
            );
            ledger.record(CopyRecord::failed(
                &source,
                &destination,
                CopyPhase::Descriptor,
                None,
                e.to_string(),
            ));
            return Ok(None);
        }
        ledger.record(CopyRecord::succeeded(
            &source,
            &destination,
            CopyPhase::Descriptor,
            None,
        ));
        reporter.success(format!(
            "Workspace descriptor: {}",
            FsUtils::file_name_str(&destination)
        ));

        match Self::activate(ctx.session, &destination).await {
            Ok(()) => reporter.info(format!("Activated workspace {}", destination.display())),
            Err(e) if e.aborts_batch() => return Err(e),
            Err(e) => reporter.warning(e.to_string()),
        }
        Ok(Some(destination))
    }

    /// Put the caller's original context back. Best effort.
    pub async fn restore(
        session: &EngineSession,
        original: Option<&Path>,
        reporter: &mut RunReporter<'_>,
    ) {
        let Some(original) = original else {
            reporter.debug("No original workspace to restore");
            return;
        };
        match Self::activate(session, original).await {
            Ok(()) => reporter.info(format!("Restored workspace {}", original.display())),
            Err(e) => reporter.warning(e.to_string()),
        }
    }

    /// Close all documents and switch context.
    async fn activate(session: &EngineSession, descriptor: &Path) -> Result<(), ReplicationError> {
        let context_error = |e: ReplicationError| match e {
            e if e.aborts_batch() => e,
            e => ReplicationError::WorkspaceContext {
                descriptor: descriptor.to_path_buf(),
                reason: e.to_string(),
            },
        };
        session.close_all().await.map_err(context_error)?;
        session
            .switch_workspace_context(descriptor)
            .await
            .map_err(context_error)
    }

    /// The configured fallback descriptor: a file, or the first descriptor
    /// directly inside a directory.
    async fn fallback_template(ctx: &RunContext<'_>) -> Result<Option<PathBuf>, ReplicationError> {
        let Some(template) = ctx.config.fallback_descriptor_template.as_deref() else {
            return Ok(None);
        };

        match tokio::fs::metadata(template).await {
            Ok(meta) if meta.is_file() => Ok(Some(template.to_path_buf())),
            Ok(meta) if meta.is_dir() => Ok(FsUtils::files_with_extension(
                template,
                &ctx.config.descriptor_extension,
            )
            .await?
            .into_iter()
            .next()),
            _ => Ok(None),
        }
    }
}
