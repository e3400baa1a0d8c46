//! Per-run context shared by every phase.

use std::path::{Path, PathBuf};

use designcopy_core::config::ReplicationConfig;
use tokio_util::sync::CancellationToken;

use crate::error::ReplicationError;
use crate::filesystem::{FsUtils, ScanFilter};
use crate::metrics::ReplicationMetrics;
use crate::models::ReplicationRequest;
use crate::partition::PathPartitioner;
use crate::rename::RenameResolver;
use crate::session::EngineSession;

/// Read-only collaborators of one replication run.
pub struct RunContext<'a> {
    /// Engine session.
    pub session: &'a EngineSession,
    /// The request being served.
    pub request: &'a ReplicationRequest,
    /// Engine configuration.
    pub config: &'a ReplicationConfig,
    /// Metrics sink.
    pub metrics: &'a ReplicationMetrics,
    /// Name resolution.
    pub resolver: RenameResolver,
    /// Scope classification.
    pub partitioner: PathPartitioner,
    /// Directory-scan filter.
    pub filter: ScanFilter,
    /// Top assembly of the source tree.
    pub top_assembly: PathBuf,
    cancel: CancellationToken,
}

impl<'a> RunContext<'a> {
    /// Build the context for a run.
    pub fn new(
        session: &'a EngineSession,
        request: &'a ReplicationRequest,
        config: &'a ReplicationConfig,
        metrics: &'a ReplicationMetrics,
        top_assembly: PathBuf,
        cancel: CancellationToken,
    ) -> Result<Self, ReplicationError> {
        let excluded = config.excluded_subtrees_under(&request.source_root);
        Ok(Self {
            session,
            request,
            config,
            metrics,
            resolver: RenameResolver::new(request, config)?,
            partitioner: PathPartitioner::new(&request.source_root, excluded.clone()),
            filter: ScanFilter {
                excluded_folder_names: config.excluded_folder_names.clone(),
                excluded_subtrees: excluded,
                temp_extensions: config.temp_extensions.clone(),
            },
            top_assembly,
            cancel,
        })
    }

    /// Source root.
    pub fn source_root(&self) -> &Path {
        &self.request.source_root
    }

    /// Destination root.
    pub fn destination_root(&self) -> &Path {
        &self.request.destination_root
    }

    /// Visibility flag for `open`.
    pub fn visible(&self) -> bool {
        self.config.open_visible
    }

    /// Whether the path is the source top assembly.
    pub fn is_top_assembly(&self, path: &Path) -> bool {
        FsUtils::same_path(path, &self.top_assembly)
    }

    /// Destination of a source file.
    pub fn destination_for(&self, original: &Path) -> PathBuf {
        self.resolver.destination_for(
            original,
            self.destination_root(),
            self.is_top_assembly(original),
        )
    }

    /// Fail with `Cancelled` once the caller cancelled.
    pub fn check_cancelled(&self) -> Result<(), ReplicationError> {
        if self.cancel.is_cancelled() {
            Err(ReplicationError::Cancelled)
        } else {
            Ok(())
        }
    }
}
