//! Reference rewriting.
//!
//! Engine auto-relinking only reaches documents that were open together.
//! Suppressed components and drawing references keep pointing at the source
//! tree, so every copied assembly and drawing is reopened at its new
//! location and its stored descriptors are patched explicitly.

use std::path::{Path, PathBuf};

use designcopy_core::types::{DocumentHandle, DocumentKind};
use tracing::debug;

use crate::context::RunContext;
use crate::error::ReplicationError;
use crate::filesystem::FsUtils;
use crate::ledger::{CopyLedger, NameLookup};
use crate::metrics::ReplicationMetrics;
use crate::models::{CopyRecord, Scope};
use crate::progress::RunReporter;

/// Where a stored reference should point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// Redirect to this destination file.
    Redirect(PathBuf),
    /// Leave the reference as it is.
    Keep,
    /// An in-scope reference with no usable destination.
    Unresolved(String),
}

/// Which pass is patching references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewritePass {
    /// Drawing copy. Orphans are not copied yet, so only exact mappings and
    /// resolver-computed destinations that already exist are trusted. Anything
    /// else is left for the final pass.
    Drawing,
    /// Final pass over every copied document, with the name fallbacks.
    Final,
}

/// Outcome of rewriting one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteCounts {
    /// Descriptors redirected.
    pub redirected: usize,
    /// Descriptors left unresolved.
    pub unresolved: usize,
}

/// Patches stored reference descriptors.
pub struct ReferenceRewriter;

impl ReferenceRewriter {
    /// Decide the destination of one stored reference.
    ///
    /// 1. An exact relocation recorded in the path mapping wins.
    /// 2. References already inside the destination, or outside the source
    ///    scope, are kept.
    /// 3. Otherwise the expected destination is recomputed from the name
    ///    mapping (only when unambiguous) or the resolver; if nothing exists
    ///    there, a unique file of that name anywhere in the destination tree
    ///    is accepted.
    ///
    /// The drawing pass stops after the resolver-computed destination and
    /// keeps the reference when that file is absent.
    pub async fn resolve_target(
        ctx: &RunContext<'_>,
        ledger: &CopyLedger,
        target: &Path,
        pass: RewritePass,
    ) -> Result<ReferenceTarget, ReplicationError> {
        if let Some(mapped) = ledger.path_mapping.get(target) {
            return Ok(ReferenceTarget::Redirect(mapped.to_path_buf()));
        }
        if FsUtils::is_under(target, ctx.destination_root())
            || ctx.partitioner.classify(target) == Scope::ExternalLibrary
        {
            return Ok(ReferenceTarget::Keep);
        }

        if pass == RewritePass::Drawing || ctx.is_top_assembly(target) {
            let expected = ctx.destination_for(target);
            return Ok(if FsUtils::exists(&expected).await {
                ReferenceTarget::Redirect(expected)
            } else if pass == RewritePass::Drawing {
                ReferenceTarget::Keep
            } else {
                ReferenceTarget::Unresolved(format!("{} was not copied", expected.display()))
            });
        }

        let original_name = FsUtils::file_name_str(target);
        let expected_name = match ledger.name_mapping.lookup(&original_name) {
            NameLookup::Unique(name) => name.to_string(),
            NameLookup::Ambiguous(count) => {
                debug!(
                    name = %original_name,
                    count,
                    "Ambiguous file name, using resolver"
                );
                ctx.resolver.resolve(target, false)
            }
            NameLookup::Missing => ctx.resolver.resolve(target, false),
        };

        let relative = FsUtils::relative_dir(target, ctx.source_root()).unwrap_or_default();
        let expected = ctx.destination_root().join(relative).join(&expected_name);
        if FsUtils::exists(&expected).await {
            return Ok(ReferenceTarget::Redirect(expected));
        }

        let mut candidates =
            FsUtils::find_by_name(ctx.destination_root(), &expected_name, &ctx.filter).await?;
        if candidates.is_empty() && !expected_name.eq_ignore_ascii_case(&original_name) {
            candidates =
                FsUtils::find_by_name(ctx.destination_root(), &original_name, &ctx.filter).await?;
        }

        Ok(match candidates.len() {
            1 => ReferenceTarget::Redirect(candidates.remove(0)),
            0 => ReferenceTarget::Unresolved(format!("no copy of {expected_name} found")),
            n => ReferenceTarget::Unresolved(format!(
                "{n} candidates named {expected_name}, refusing to guess"
            )),
        })
    }

    /// Patch the stored references of an open document and return the counts.
    pub async fn patch_open_document(
        ctx: &RunContext<'_>,
        ledger: &CopyLedger,
        handle: DocumentHandle,
        document: &Path,
        reporter: &mut RunReporter<'_>,
        pass: RewritePass,
    ) -> Result<RewriteCounts, ReplicationError> {
        let mut counts = RewriteCounts::default();

        for reference in ctx.session.file_references(handle).await? {
            match Self::resolve_target(ctx, ledger, &reference.path, pass).await? {
                ReferenceTarget::Redirect(new_path) => {
                    if FsUtils::same_path(&new_path, &reference.path)
                        || !FsUtils::exists(&new_path).await
                    {
                        continue;
                    }
                    debug!(
                        document = %document.display(),
                        from = %reference.path.display(),
                        to = %new_path.display(),
                        "Redirecting reference"
                    );
                    ctx.session
                        .redirect_file_reference(handle, reference, &new_path)
                        .await?;
                    counts.redirected += 1;
                }
                ReferenceTarget::Keep => {}
                ReferenceTarget::Unresolved(reason) => {
                    let err = ReplicationError::ReferenceResolution {
                        document: document.to_path_buf(),
                        target: reference.path.clone(),
                        reason,
                    };
                    reporter.warning(err.to_string());
                    counts.unresolved += 1;
                }
            }
        }

        Ok(counts)
    }

    /// Final pass over every copied assembly and drawing: assemblies first
    /// with the top assembly last, then drawings.
    pub async fn rewrite_all(
        ctx: &RunContext<'_>,
        ledger: &CopyLedger,
        reporter: &mut RunReporter<'_>,
        progress: (u8, u8),
    ) -> Result<RewriteCounts, ReplicationError> {
        let mut targets: Vec<&CopyRecord> = ledger
            .records()
            .iter()
            .filter(|r| r.success && r.kind.is_some_and(|k| k.is_rewritable()))
            .collect();
        targets.sort_by_key(|r| match r.kind {
            Some(DocumentKind::Assembly) if r.is_top_assembly => 1,
            Some(DocumentKind::Assembly) => 0,
            _ => 2,
        });

        let total = targets.len();
        let mut totals = RewriteCounts::default();
        reporter.info(format!("Checking references of {total} document(s)"));

        for (done, record) in targets.into_iter().enumerate() {
            ctx.check_cancelled()?;
            reporter.progress_within(
                progress.0,
                progress.1,
                done,
                total,
                &format!("Checking references: {}", record.new_file_name),
            );

            match Self::rewrite_document(ctx, ledger, &record.new_path, reporter).await {
                Ok(counts) => {
                    totals.redirected += counts.redirected;
                    totals.unresolved += counts.unresolved;
                    if counts.redirected > 0 {
                        reporter.debug(format!(
                            "{} reference(s) redirected in {}",
                            counts.redirected, record.new_file_name
                        ));
                    }
                }
                Err(e) if e.aborts_batch() => return Err(e),
                Err(e) => reporter.warning(format!(
                    "Reference check failed for {}: {e}",
                    record.new_path.display()
                )),
            }
        }

        ReplicationMetrics::add(&ctx.metrics.references_redirected, totals.redirected as u64);
        ReplicationMetrics::add(&ctx.metrics.references_unresolved, totals.unresolved as u64);
        Ok(totals)
    }

    /// Reopen one copied document, patch it, and save only when changed.
    async fn rewrite_document(
        ctx: &RunContext<'_>,
        ledger: &CopyLedger,
        path: &Path,
        reporter: &mut RunReporter<'_>,
    ) -> Result<RewriteCounts, ReplicationError> {
        let handle = ctx.session.open(path, ctx.visible()).await?;
        let result =
            Self::patch_open_document(ctx, ledger, handle, path, reporter, RewritePass::Final)
                .await;

        let saved = match &result {
            Ok(counts) if counts.redirected > 0 => ctx.session.save(handle).await,
            _ => Ok(()),
        };
        let closed = ctx.session.close(handle, false).await;

        let counts = result?;
        saved?;
        closed?;
        Ok(counts)
    }
}
