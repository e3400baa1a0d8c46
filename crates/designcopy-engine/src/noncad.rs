//! Plain replication of non-CAD files, preserving directory structure.

use designcopy_core::types::DocumentKind;

use crate::context::RunContext;
use crate::error::ReplicationError;
use crate::filesystem::FsUtils;
use crate::ledger::CopyLedger;
use crate::metrics::ReplicationMetrics;
use crate::models::{CopyPhase, CopyRecord, Scope};
use crate::progress::RunReporter;

/// Copies every remaining non-CAD file.
pub struct NonCadFileReplicator;

impl NonCadFileReplicator {
    /// Copy non-CAD files under the source root. The primary workspace
    /// descriptor is left to the relocator. Returns the number copied.
    pub async fn copy_all(
        ctx: &RunContext<'_>,
        ledger: &mut CopyLedger,
        reporter: &mut RunReporter<'_>,
        progress: (u8, u8),
    ) -> Result<usize, ReplicationError> {
        let files: Vec<_> = FsUtils::collect_files(ctx.source_root(), &ctx.filter)
            .await?
            .into_iter()
            .filter(|p| !DocumentKind::is_cad_file(p))
            .filter(|p| !ctx.resolver.is_workspace_descriptor(p))
            .filter(|p| ctx.partitioner.classify(p) == Scope::InScope)
            .filter(|p| !ledger.is_processed(p))
            .collect();

        let total = files.len();
        reporter.info(format!("Copying {total} non-CAD file(s)"));
        let mut copied = 0;

        for (done, file) in files.iter().enumerate() {
            ctx.check_cancelled()?;
            let destination = ctx.destination_for(file);
            reporter.progress_within(
                progress.0,
                progress.1,
                done,
                total,
                &format!("Copying {}", FsUtils::file_name_str(file)),
            );

            match FsUtils::copy_file(file, &destination).await {
                Ok(_) => {
                    ReplicationMetrics::incr(&ctx.metrics.non_cad_copied);
                    ledger.record(CopyRecord::succeeded(
                        file,
                        &destination,
                        CopyPhase::NonCad,
                        None,
                    ));
                    copied += 1;
                }
                Err(e) => {
                    let err = ReplicationError::Copy {
                        path: file.clone(),
                        reason: e.to_string(),
                    };
                    reporter.warning(err.to_string());
                    ledger.record(CopyRecord::failed(
                        file,
                        &destination,
                        CopyPhase::NonCad,
                        None,
                        e.to_string(),
                    ));
                }
            }
        }

        Ok(copied)
    }
}
