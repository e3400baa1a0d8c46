//! Replication state machine.
//!
//! `Idle -> Preparing -> GraphCopy -> DrawingCopy -> OrphanCopy ->
//! ReferenceRewrite -> NonCadCopy -> DescriptorRelocate -> Finalize -> Done`,
//! with `Failed` reachable from any state. Everything runs sequentially on
//! the caller's task; engine calls are serialised by the session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use designcopy_core::config::ReplicationConfig;
use designcopy_core::types::RunId;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::context::RunContext;
use crate::error::ReplicationError;
use crate::executor::ReplicationExecutor;
use crate::filesystem::FsUtils;
use crate::graph::ReferenceGraphCollector;
use crate::ledger::CopyLedger;
use crate::metrics::ReplicationMetrics;
use crate::models::{
    PlannedCopy, ProjectSource, ReplicationPlan, ReplicationRequest, ReplicationResult,
    ReplicationState,
};
use crate::noncad::NonCadFileReplicator;
use crate::orphan::OrphanScanner;
use crate::progress::{ProgressSink, RunReporter};
use crate::rewrite::ReferenceRewriter;
use crate::schedule::CopyScheduler;
use crate::session::EngineSession;
use crate::workspace::WorkspaceRelocator;

/// Mutable bookkeeping of one run.
struct RunState {
    state: ReplicationState,
    entered_at: Instant,
    original_context: Option<PathBuf>,
    switched: bool,
    properties_updated: usize,
    top_assembly_path: Option<PathBuf>,
}

impl RunState {
    fn new() -> Self {
        Self {
            state: ReplicationState::Idle,
            entered_at: Instant::now(),
            original_context: None,
            switched: false,
            properties_updated: 0,
            top_assembly_path: None,
        }
    }

    fn enter(&mut self, next: ReplicationState, metrics: &ReplicationMetrics) {
        metrics.record_phase(self.state, self.entered_at.elapsed());
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
        self.entered_at = Instant::now();
    }
}

/// Sequences the replication phases over one engine session.
pub struct Orchestrator {
    session: EngineSession,
    config: ReplicationConfig,
    metrics: Arc<ReplicationMetrics>,
    run_lock: Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator over a session.
    pub fn new(session: EngineSession, config: ReplicationConfig) -> Self {
        Self {
            session,
            config,
            metrics: Arc::new(ReplicationMetrics::new()),
            run_lock: Mutex::new(()),
        }
    }

    /// Shared metrics.
    pub fn metrics(&self) -> Arc<ReplicationMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Engine session.
    pub fn session(&self) -> &EngineSession {
        &self.session
    }

    /// Engine configuration.
    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Stop the engine session.
    pub async fn shutdown(self) -> Result<(), ReplicationError> {
        self.session.shutdown().await
    }

    /// Run a replication.
    ///
    /// Fails only when another run is in progress or the request is
    /// invalid. Every other outcome, fatal ones included, is reported in
    /// the returned result with full counts and log.
    #[instrument(
        skip(self, request, sink, cancel),
        fields(run_id = tracing::field::Empty, project_id = %request.project_id)
    )]
    pub async fn execute(
        &self,
        request: ReplicationRequest,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<ReplicationResult, ReplicationError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| ReplicationError::AlreadyRunning)?;
        request
            .validate()
            .map_err(|e| ReplicationError::InvalidRequest(e.to_string()))?;
        check_roots(&request)?;

        let run_id = RunId::new();
        tracing::Span::current().record("run_id", run_id.to_string());
        let started_at = Utc::now();
        ReplicationMetrics::incr(&self.metrics.runs_started);

        let mut reporter = RunReporter::new(sink);
        let mut ledger = CopyLedger::new();
        let mut run = RunState::new();

        reporter.progress(0, "Starting replication");
        reporter.info(format!(
            "Replicating {} -> {} as {}",
            request.source_root.display(),
            request.destination_root.display(),
            request.project_id
        ));

        let outcome = self
            .run_phases(&request, &cancel, &mut run, &mut ledger, &mut reporter)
            .await;

        let error_message = match outcome {
            Ok(()) => {
                run.enter(ReplicationState::Done, &self.metrics);
                reporter.progress(100, "Replication complete");
                None
            }
            Err(e) => {
                let failed_in = run.state;
                run.enter(ReplicationState::Failed, &self.metrics);
                reporter.error(format!("Replication failed during {failed_in}: {e}"));
                if matches!(e, ReplicationError::Cancelled) {
                    ReplicationMetrics::incr(&self.metrics.runs_cancelled);
                }

                if let Err(close) = self.session.close_all().await {
                    reporter.warning(format!("Failed to close documents: {close}"));
                }
                if run.switched {
                    WorkspaceRelocator::restore(
                        &self.session,
                        run.original_context.as_deref(),
                        &mut reporter,
                    )
                    .await;
                }
                Some(e.to_string())
            }
        };

        let files_copied = ledger.files_copied();
        let success = error_message.is_none() && files_copied > 0;
        if success {
            ReplicationMetrics::incr(&self.metrics.runs_succeeded);
            reporter.success(format!(
                "{} file(s) copied, {} failed, {} skipped",
                files_copied,
                ledger.files_failed(),
                ledger.files_skipped()
            ));
        } else {
            ReplicationMetrics::incr(&self.metrics.runs_failed);
            if error_message.is_none() {
                reporter.warning("No files were copied");
            }
        }

        info!(
            success,
            files_copied,
            files_failed = ledger.files_failed(),
            files_skipped = ledger.files_skipped(),
            state = %run.state,
            "Replication finished"
        );

        let files_failed = ledger.files_failed();
        let files_skipped = ledger.files_skipped();
        let (log, warnings) = reporter.into_parts();

        Ok(ReplicationResult {
            run_id,
            success,
            files_copied,
            files_failed,
            files_skipped,
            properties_updated: run.properties_updated,
            destination_path: request.destination_root.clone(),
            top_assembly_path: run.top_assembly_path,
            error_message,
            records: ledger.into_records(),
            warnings,
            log,
            final_state: run.state,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_phases(
        &self,
        request: &ReplicationRequest,
        cancel: &CancellationToken,
        run: &mut RunState,
        ledger: &mut CopyLedger,
        reporter: &mut RunReporter<'_>,
    ) -> Result<(), ReplicationError> {
        run.enter(ReplicationState::Preparing, &self.metrics);
        reporter.progress(2, "Preparing");

        let top_assembly = discover_top_assembly(request, &self.config).await?;
        reporter.info(format!("Top assembly: {}", top_assembly.display()));
        let ctx = RunContext::new(
            &self.session,
            request,
            &self.config,
            &self.metrics,
            top_assembly,
            cancel.clone(),
        )?;

        let prep = WorkspaceRelocator::prepare(&ctx, reporter).await?;
        run.original_context = prep.original_context;
        run.switched = prep.switched;
        reporter.progress(5, "Workspace ready");
        ctx.check_cancelled()?;

        WorkspaceRelocator::create_skeleton(&ctx, reporter).await?;
        reporter.progress(8, "Folder structure created");

        run.enter(ReplicationState::GraphCopy, &self.metrics);
        ctx.check_cancelled()?;
        let graph = ReferenceGraphCollector::new(&self.session, ctx.visible())
            .collect(&ctx.top_assembly)
            .await?;
        reporter.progress(10, "Reference graph collected");

        let (in_scope, external) = ctx.partitioner.partition(graph.nodes);
        reporter.info(format!(
            "{} in-scope document(s), {} external library document(s) left untouched",
            in_scope.len(),
            external.len()
        ));
        for node in &external {
            reporter.debug(format!("External: {}", node.path.display()));
        }
        let scheduled = CopyScheduler::schedule(in_scope);
        ReplicationExecutor::copy_graph(&ctx, &scheduled, ledger, reporter, (15, 70)).await?;
        reporter.progress(72, "Graph copy complete");

        run.enter(ReplicationState::DrawingCopy, &self.metrics);
        ReplicationExecutor::copy_drawings(&ctx, ledger, reporter, (75, 80)).await?;

        run.enter(ReplicationState::OrphanCopy, &self.metrics);
        ctx.check_cancelled()?;
        OrphanScanner::copy_orphans(&ctx, ledger, reporter).await?;
        reporter.progress(80, "Orphan files copied");

        run.enter(ReplicationState::ReferenceRewrite, &self.metrics);
        ReferenceRewriter::rewrite_all(&ctx, ledger, reporter, (80, 85)).await?;
        reporter.progress(85, "References checked");

        run.enter(ReplicationState::NonCadCopy, &self.metrics);
        NonCadFileReplicator::copy_all(&ctx, ledger, reporter, (85, 88)).await?;
        reporter.progress(88, "Non-CAD files copied");

        run.enter(ReplicationState::DescriptorRelocate, &self.metrics);
        ctx.check_cancelled()?;
        WorkspaceRelocator::relocate(&ctx, ledger, reporter).await?;
        reporter.progress(92, "Workspace descriptor relocated");

        run.enter(ReplicationState::Finalize, &self.metrics);
        ctx.check_cancelled()?;
        let (applied, top_path) = self.finalize(&ctx, ledger, reporter).await?;
        run.properties_updated = applied;
        run.top_assembly_path = top_path;
        Ok(())
    }

    /// Reopen the new top assembly, stamp metadata, rebuild and save.
    async fn finalize(
        &self,
        ctx: &RunContext<'_>,
        ledger: &mut CopyLedger,
        reporter: &mut RunReporter<'_>,
    ) -> Result<(usize, Option<PathBuf>), ReplicationError> {
        let Some(index) = ledger
            .records()
            .iter()
            .position(|r| r.is_top_assembly && r.success)
        else {
            reporter.warning("Top assembly was not copied, metadata not applied");
            return Ok((0, None));
        };
        let path = ledger.records()[index].new_path.clone();

        if ctx.request.metadata.is_empty() {
            reporter.debug("No metadata requested");
            return Ok((0, Some(path)));
        }

        reporter.progress(94, "Applying metadata");
        let handle = match ctx.session.open(&path, ctx.visible()).await {
            Ok(handle) => handle,
            Err(e) if e.aborts_batch() => return Err(e),
            Err(e) => {
                reporter.warning(format!("Cannot open {}: {e}", path.display()));
                return Ok((0, Some(path)));
            }
        };

        let mut applied = 0;
        for stamp in &ctx.request.metadata {
            match ctx
                .session
                .set_property(handle, stamp.set, &stamp.name, &stamp.value)
                .await
            {
                Ok(()) => applied += 1,
                Err(e) if e.aborts_batch() => return Err(e),
                Err(e) => reporter.warning(format!(
                    "Property {}/{} not set: {e}",
                    stamp.set, stamp.name
                )),
            }
        }

        if let Err(e) = ctx.session.update(handle).await {
            reporter.warning(format!("Rebuild failed: {e}"));
        }
        if let Err(e) = ctx.session.save(handle).await {
            reporter.warning(format!("Cannot save {}: {e}", path.display()));
            applied = 0;
        }
        if let Err(e) = ctx.session.close(handle, false).await {
            reporter.warning(format!("Cannot close {}: {e}", path.display()));
        }

        if applied > 0 {
            ledger.records_mut()[index].properties_applied = true;
        }
        ReplicationMetrics::add(&ctx.metrics.properties_applied, applied as u64);
        reporter.success(format!("{applied} propert(ies) applied to {}", path.display()));
        reporter.progress(96, "Top assembly saved");
        Ok((applied, Some(path)))
    }

    /// Dry run: collect, partition and schedule the graph, list drawings,
    /// and compute every destination without writing anything.
    pub async fn plan(
        &self,
        request: &ReplicationRequest,
    ) -> Result<ReplicationPlan, ReplicationError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| ReplicationError::AlreadyRunning)?;
        request
            .validate()
            .map_err(|e| ReplicationError::InvalidRequest(e.to_string()))?;
        check_roots(request)?;

        let top_assembly = discover_top_assembly(request, &self.config).await?;
        let ctx = RunContext::new(
            &self.session,
            request,
            &self.config,
            &self.metrics,
            top_assembly.clone(),
            CancellationToken::new(),
        )?;

        let collected = ReferenceGraphCollector::new(&self.session, ctx.visible())
            .collect(&top_assembly)
            .await;
        let closed = self.session.close_all().await;
        let graph = collected?;
        closed?;

        let (in_scope, external) = ctx.partitioner.partition(graph.nodes);
        let graph_plan = CopyScheduler::schedule(in_scope)
            .into_iter()
            .map(|node| PlannedCopy {
                new_path: ctx.destination_for(&node.path),
                priority: CopyScheduler::priority(&node),
                is_top_assembly: node.is_root,
                kind: node.kind,
                original_path: node.path,
            })
            .collect();

        let drawings = ReplicationExecutor::pending_drawings(&ctx, &CopyLedger::new())
            .await?
            .into_iter()
            .map(|path| PlannedCopy {
                new_path: ctx.destination_for(&path),
                priority: None,
                is_top_assembly: false,
                kind: designcopy_core::types::DocumentKind::Drawing,
                original_path: path,
            })
            .collect();

        Ok(ReplicationPlan {
            top_assembly,
            graph: graph_plan,
            drawings,
            external: external.into_iter().map(|n| n.path).collect(),
        })
    }
}

/// Reject a destination that is the source root or lies inside it.
fn check_roots(request: &ReplicationRequest) -> Result<(), ReplicationError> {
    if FsUtils::is_under(&request.destination_root, &request.source_root) {
        return Err(ReplicationError::InvalidRequest(format!(
            "destination {} is inside source {}",
            request.destination_root.display(),
            request.source_root.display()
        )));
    }
    Ok(())
}

/// Determine the top assembly of a request: the explicit one (relative
/// paths resolve against the source root), else the configured template
/// name at the source root (template sources only), else the first
/// assembly directly in the root.
pub async fn discover_top_assembly(
    request: &ReplicationRequest,
    config: &ReplicationConfig,
) -> Result<PathBuf, ReplicationError> {
    let source_root = &request.source_root;
    if !FsUtils::exists(source_root).await {
        return Err(ReplicationError::Discovery {
            path: source_root.clone(),
            reason: "source root does not exist".to_string(),
        });
    }

    if let Some(explicit) = &request.top_assembly {
        let path = if explicit.is_absolute() {
            explicit.clone()
        } else {
            source_root.join(explicit)
        };
        if !FsUtils::is_under(&path, source_root) {
            return Err(ReplicationError::InvalidRequest(format!(
                "top assembly {} is outside the source root",
                path.display()
            )));
        }
        if !FsUtils::exists(&path).await {
            return Err(ReplicationError::Discovery {
                path,
                reason: "top assembly not found".to_string(),
            });
        }
        return Ok(path);
    }

    if request.source_kind == ProjectSource::Template {
        let template = source_root.join(&config.template_top_assembly);
        if FsUtils::exists(&template).await {
            return Ok(template);
        }
    }

    FsUtils::files_with_extension(source_root, &config.assembly_extension)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ReplicationError::Discovery {
            path: source_root.clone(),
            reason: "no top assembly found at the source root".to_string(),
        })
}

/// Whether the destination already holds files.
pub async fn destination_is_populated(destination: &Path) -> bool {
    match tokio::fs::read_dir(destination).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestDocument, ManifestEngine};
    use crate::progress::NullProgress;
    use designcopy_core::traits::AuthoringEngine;

    async fn orchestrator() -> Orchestrator {
        let session = EngineSession::spawn(|| {
            Ok(Box::new(ManifestEngine::new()) as Box<dyn AuthoringEngine>)
        })
        .await
        .expect("spawn");
        Orchestrator::new(session, ReplicationConfig::default())
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let orch = orchestrator().await;
        let _held = orch.run_lock.try_lock().expect("lock");

        let request = ReplicationRequest::new("/src", "/dst", "P1");
        let result = orch
            .execute(request, &NullProgress, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ReplicationError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let orch = orchestrator().await;
        let request = ReplicationRequest::new("/src", "/dst", "");
        let result = orch
            .execute(request, &NullProgress, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ReplicationError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_destination_inside_source_is_rejected() {
        let orch = orchestrator().await;

        let nested = ReplicationRequest::new("/src/Module", "/SRC/Module/out", "P1");
        let result = orch
            .execute(nested, &NullProgress, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ReplicationError::InvalidRequest(_))));

        let same = ReplicationRequest::new("/src/Module", "/src/Module", "P1");
        assert!(matches!(
            orch.plan(&same).await,
            Err(ReplicationError::InvalidRequest(_))
        ));

        let sibling = ReplicationRequest::new("/src/Module", "/src/Module_copy", "P1");
        assert!(check_roots(&sibling).is_ok());
    }

    #[tokio::test]
    async fn test_missing_source_fails_with_result() {
        let temp = tempfile::tempdir().expect("tempdir");
        let orch = orchestrator().await;
        let request = ReplicationRequest::new(
            temp.path().join("missing"),
            temp.path().join("dst"),
            "P1",
        );

        let result = orch
            .execute(request, &NullProgress, CancellationToken::new())
            .await
            .expect("result");
        assert!(!result.success);
        assert_eq!(result.final_state, ReplicationState::Failed);
        assert!(result.error_message.is_some());
        assert_eq!(orch.metrics().snapshot().runs_failed, 1);
    }

    #[tokio::test]
    async fn test_top_assembly_discovery_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        ManifestDocument::default()
            .write(&root.join("B.iam"))
            .expect("write");
        ManifestDocument::default()
            .write(&root.join("A.iam"))
            .expect("write");

        let config = ReplicationConfig::default();
        let mut request = ReplicationRequest::new(root, root.join("out"), "P1");
        assert_eq!(
            discover_top_assembly(&request, &config).await.expect("top"),
            root.join("A.iam")
        );

        ManifestDocument::default()
            .write(&root.join("Module_.iam"))
            .expect("write");
        assert_eq!(
            discover_top_assembly(&request, &config).await.expect("top"),
            root.join("Module_.iam")
        );

        request.source_kind = ProjectSource::ExistingProject;
        assert_eq!(
            discover_top_assembly(&request, &config).await.expect("top"),
            root.join("A.iam")
        );

        request.top_assembly = Some(PathBuf::from("B.iam"));
        assert_eq!(
            discover_top_assembly(&request, &config).await.expect("top"),
            root.join("B.iam")
        );

        request.top_assembly = Some(PathBuf::from("/elsewhere/X.iam"));
        assert!(matches!(
            discover_top_assembly(&request, &config).await,
            Err(ReplicationError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_no_top_assembly_is_discovery_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = ReplicationRequest::new(temp.path(), temp.path().join("out"), "P1");
        assert!(matches!(
            discover_top_assembly(&request, &ReplicationConfig::default()).await,
            Err(ReplicationError::Discovery { .. })
        ));
    }
}
