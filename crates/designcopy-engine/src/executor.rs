//! Engine-driven copy phases.
//!
//! The graph-copy phase saves every scheduled node while the whole graph
//! stays open, so the engine relinks each new copy to already-relocated
//! dependencies. Drawings are never loaded with their dependents, so the
//! drawing phase patches their references before saving.

use std::path::{Path, PathBuf};

use designcopy_core::types::{DocumentHandle, DocumentKind};

use crate::context::RunContext;
use crate::error::ReplicationError;
use crate::filesystem::FsUtils;
use crate::ledger::CopyLedger;
use crate::metrics::ReplicationMetrics;
use crate::models::{CopyPhase, CopyRecord, DocumentNode, Scope};
use crate::progress::RunReporter;
use crate::rewrite::{ReferenceRewriter, RewritePass};

/// Drives the authoring engine through the copy phases.
pub struct ReplicationExecutor;

impl ReplicationExecutor {
    /// Save each scheduled node at its destination, in order.
    ///
    /// Per-file failures are recorded and the batch continues. All
    /// documents are closed afterwards to release the session.
    pub async fn copy_graph(
        ctx: &RunContext<'_>,
        scheduled: &[DocumentNode],
        ledger: &mut CopyLedger,
        reporter: &mut RunReporter<'_>,
        progress: (u8, u8),
    ) -> Result<(), ReplicationError> {
        let total = scheduled.len();
        reporter.info(format!("Copying {total} document(s) from the reference graph"));

        for (done, node) in scheduled.iter().enumerate() {
            ctx.check_cancelled()?;
            if ledger.is_processed(&node.path) {
                reporter.debug(format!("Already processed: {}", node.path.display()));
                continue;
            }

            let destination = ctx.destination_for(&node.path);
            let name = FsUtils::file_name_str(&destination);
            reporter.progress_within(
                progress.0,
                progress.1,
                done,
                total,
                &format!("Copying {name}"),
            );

            let is_top = ctx.is_top_assembly(&node.path);
            match Self::save_node(ctx, node, &destination).await {
                Ok(()) => {
                    ReplicationMetrics::incr(&ctx.metrics.documents_copied);
                    reporter.debug(format!(
                        "{} -> {}",
                        node.path.display(),
                        destination.display()
                    ));
                    ledger.record(
                        CopyRecord::succeeded(
                            &node.path,
                            &destination,
                            CopyPhase::Graph,
                            Some(node.kind),
                        )
                        .top_assembly(is_top),
                    );
                }
                Err(e) if e.aborts_batch() => return Err(e),
                Err(e) => {
                    ReplicationMetrics::incr(&ctx.metrics.documents_failed);
                    let err = ReplicationError::Copy {
                        path: node.path.clone(),
                        reason: e.to_string(),
                    };
                    reporter.warning(err.to_string());
                    ledger.record(
                        CopyRecord::failed(
                            &node.path,
                            &destination,
                            CopyPhase::Graph,
                            Some(node.kind),
                            e.to_string(),
                        )
                        .top_assembly(is_top),
                    );
                }
            }
        }

        if let Err(e) = ctx.session.close_all().await {
            if e.aborts_batch() {
                return Err(e);
            }
            reporter.warning(format!("Failed to close documents after graph copy: {e}"));
        }
        Ok(())
    }

    async fn save_node(
        ctx: &RunContext<'_>,
        node: &DocumentNode,
        destination: &Path,
    ) -> Result<(), ReplicationError> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let handle = match node.handle {
            Some(handle) => handle,
            None => ctx.session.open(&node.path, ctx.visible()).await?,
        };
        ctx.session.save_as(handle, destination).await
    }

    /// In-scope drawings on disk that were not processed yet, sorted.
    pub async fn pending_drawings(
        ctx: &RunContext<'_>,
        ledger: &CopyLedger,
    ) -> Result<Vec<PathBuf>, ReplicationError> {
        Ok(FsUtils::collect_files(ctx.source_root(), &ctx.filter)
            .await?
            .into_iter()
            .filter(|p| DocumentKind::from_path(p) == Some(DocumentKind::Drawing))
            .filter(|p| ctx.partitioner.classify(p) == Scope::InScope)
            .filter(|p| !ledger.is_processed(p))
            .collect())
    }

    /// Copy every in-scope drawing found on disk that was not processed yet.
    pub async fn copy_drawings(
        ctx: &RunContext<'_>,
        ledger: &mut CopyLedger,
        reporter: &mut RunReporter<'_>,
        progress: (u8, u8),
    ) -> Result<(), ReplicationError> {
        let drawings = Self::pending_drawings(ctx, ledger).await?;
        let total = drawings.len();
        if total == 0 {
            reporter.info("No drawings to copy");
            return Ok(());
        }
        reporter.info(format!("Copying {total} drawing(s)"));

        for (done, drawing) in drawings.iter().enumerate() {
            ctx.check_cancelled()?;
            let destination = ctx.destination_for(drawing);
            reporter.progress_within(
                progress.0,
                progress.1,
                done,
                total,
                &format!("Copying drawing {}", FsUtils::file_name_str(&destination)),
            );

            match Self::save_drawing(ctx, ledger, drawing, &destination, reporter).await {
                Ok(redirected) => {
                    ReplicationMetrics::incr(&ctx.metrics.drawings_copied);
                    ReplicationMetrics::add(
                        &ctx.metrics.references_redirected,
                        redirected as u64,
                    );
                    reporter.debug(format!(
                        "{} -> {} ({redirected} reference(s) redirected)",
                        drawing.display(),
                        destination.display()
                    ));
                    ledger.record(CopyRecord::succeeded(
                        drawing,
                        &destination,
                        CopyPhase::Drawing,
                        Some(DocumentKind::Drawing),
                    ));
                }
                Err(e) if e.aborts_batch() => return Err(e),
                Err(e) => {
                    ReplicationMetrics::incr(&ctx.metrics.documents_failed);
                    let err = ReplicationError::Copy {
                        path: drawing.clone(),
                        reason: e.to_string(),
                    };
                    reporter.warning(err.to_string());
                    ledger.record(CopyRecord::failed(
                        drawing,
                        &destination,
                        CopyPhase::Drawing,
                        Some(DocumentKind::Drawing),
                        e.to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Open, patch, save-as and close one drawing. Unresolved references are
    /// left for the final rewrite pass, which runs after orphans exist.
    async fn save_drawing(
        ctx: &RunContext<'_>,
        ledger: &CopyLedger,
        drawing: &Path,
        destination: &Path,
        reporter: &mut RunReporter<'_>,
    ) -> Result<usize, ReplicationError> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let handle = ctx.session.open(drawing, ctx.visible()).await?;
        let result = Self::patch_and_save(ctx, ledger, handle, drawing, destination, reporter).await;
        let closed = ctx.session.close(handle, false).await;

        let redirected = result?;
        closed?;
        Ok(redirected)
    }

    async fn patch_and_save(
        ctx: &RunContext<'_>,
        ledger: &CopyLedger,
        handle: DocumentHandle,
        drawing: &Path,
        destination: &Path,
        reporter: &mut RunReporter<'_>,
    ) -> Result<usize, ReplicationError> {
        let counts = ReferenceRewriter::patch_open_document(
            ctx,
            ledger,
            handle,
            drawing,
            reporter,
            RewritePass::Drawing,
        )
        .await?;
        ctx.session.save_as(handle, destination).await?;
        Ok(counts.redirected)
    }
}
