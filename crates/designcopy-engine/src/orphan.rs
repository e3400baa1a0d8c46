//! Orphan replication: in-scope CAD files on disk that the graph walk did
//! not reach (unreferenced by the active configuration, suppressed-only,
//! or simply unused) are copied as plain files.

use designcopy_core::types::DocumentKind;

use crate::context::RunContext;
use crate::error::ReplicationError;
use crate::filesystem::FsUtils;
use crate::ledger::CopyLedger;
use crate::metrics::ReplicationMetrics;
use crate::models::{CopyPhase, CopyRecord, Scope};
use crate::progress::RunReporter;

/// Counts from an orphan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrphanCounts {
    /// Files copied.
    pub copied: usize,
    /// Files whose destination already existed.
    pub skipped: usize,
    /// Files that failed.
    pub failed: usize,
}

/// Finds and copies CAD files missed by the engine phases.
pub struct OrphanScanner;

impl OrphanScanner {
    /// Copy every unprocessed in-scope CAD file to its resolved destination.
    pub async fn copy_orphans(
        ctx: &RunContext<'_>,
        ledger: &mut CopyLedger,
        reporter: &mut RunReporter<'_>,
    ) -> Result<OrphanCounts, ReplicationError> {
        let orphans: Vec<_> = FsUtils::collect_files(ctx.source_root(), &ctx.filter)
            .await?
            .into_iter()
            .filter(|p| DocumentKind::is_cad_file(p))
            .filter(|p| ctx.partitioner.classify(p) == Scope::InScope)
            .filter(|p| !ledger.is_processed(p))
            .collect();

        let mut counts = OrphanCounts::default();
        if orphans.is_empty() {
            reporter.debug("No orphan CAD files found");
            return Ok(counts);
        }
        reporter.info(format!("Copying {} orphan CAD file(s)", orphans.len()));

        for orphan in orphans {
            ctx.check_cancelled()?;
            let destination = ctx.destination_for(&orphan);
            let kind = DocumentKind::from_path(&orphan);

            if FsUtils::exists(&destination).await {
                ReplicationMetrics::incr(&ctx.metrics.orphans_skipped);
                reporter.debug(format!("Orphan already present: {}", destination.display()));
                ledger.record_skipped(&orphan, destination);
                counts.skipped += 1;
                continue;
            }

            match FsUtils::copy_file(&orphan, &destination).await {
                Ok(_) => {
                    ReplicationMetrics::incr(&ctx.metrics.orphans_copied);
                    reporter.debug(format!(
                        "Orphan {} -> {}",
                        orphan.display(),
                        destination.display()
                    ));
                    ledger.record(CopyRecord::succeeded(
                        &orphan,
                        &destination,
                        CopyPhase::Orphan,
                        kind,
                    ));
                    counts.copied += 1;
                }
                Err(e) => {
                    let err = ReplicationError::Copy {
                        path: orphan.clone(),
                        reason: e.to_string(),
                    };
                    reporter.warning(err.to_string());
                    ledger.record(CopyRecord::failed(
                        &orphan,
                        &destination,
                        CopyPhase::Orphan,
                        kind,
                        e.to_string(),
                    ));
                    counts.failed += 1;
                }
            }
        }

        reporter.info(format!(
            "Orphans: {} copied, {} skipped, {} failed",
            counts.copied, counts.skipped, counts.failed
        ));
        Ok(counts)
    }
}
