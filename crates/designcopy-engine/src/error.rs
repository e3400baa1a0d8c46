//! Error taxonomy of the replication engine.
//!
//! Per-file failures (`Copy`, `ReferenceResolution`) are contained at the
//! file boundary and surfaced through the run log. The remaining variants
//! abort the run and map cleanly to `designcopy_core::error::AppError`.

use std::path::PathBuf;

use designcopy_core::error::{AppError, ErrorKind};
use thiserror::Error;

/// Unified error type for replication operations.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// The root document could not be opened or walked.
    #[error("Cannot open root document {path}: {reason}")]
    Discovery {
        /// Root document path.
        path: PathBuf,
        /// Engine-reported reason.
        reason: String,
    },

    /// A stored reference could not be mapped to a destination file.
    #[error("Cannot resolve reference {target} in {document}: {reason}")]
    ReferenceResolution {
        /// Document holding the reference.
        document: PathBuf,
        /// Original reference target.
        target: PathBuf,
        /// Why no destination was chosen.
        reason: String,
    },

    /// A single file could not be saved or copied.
    #[error("Failed to copy {path}: {reason}")]
    Copy {
        /// Source file.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Switching or restoring the workspace context failed.
    #[error("Workspace context error for {descriptor}: {reason}")]
    WorkspaceContext {
        /// Descriptor that could not be activated.
        descriptor: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// An unexpected failure outside per-file boundaries.
    #[error("Replication aborted: {0}")]
    Fatal(String),

    /// The run was cancelled through its cancellation token.
    #[error("Replication was cancelled")]
    Cancelled,

    /// The engine session worker is gone.
    #[error("Authoring engine session is closed")]
    SessionClosed,

    /// Another replication is already running on this orchestrator.
    #[error("A replication is already running")]
    AlreadyRunning,

    /// The request failed validation before any work started.
    #[error("Invalid replication request: {0}")]
    InvalidRequest(String),

    /// The authoring engine rejected an operation.
    #[error("Engine error: {0}")]
    Engine(#[from] AppError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tokio task join error.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A configured descriptor pattern is not a valid regex.
    #[error("Invalid descriptor pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl ReplicationError {
    /// Whether a failure inside a per-file step must still stop the batch.
    /// Losing the engine session or the caller cancelling cannot be
    /// contained at the file boundary.
    pub fn aborts_batch(&self) -> bool {
        matches!(
            self,
            Self::SessionClosed | Self::Cancelled | Self::Fatal(_) | Self::Join(_)
        )
    }
}

impl From<ReplicationError> for AppError {
    fn from(err: ReplicationError) -> Self {
        match err {
            ReplicationError::Engine(inner) => inner,
            ReplicationError::Discovery { .. } => AppError::not_found(err.to_string()),
            ReplicationError::Cancelled => AppError::cancelled(err.to_string()),
            ReplicationError::AlreadyRunning => AppError::conflict(err.to_string()),
            ReplicationError::InvalidRequest(_) | ReplicationError::Pattern(_) => {
                AppError::validation(err.to_string())
            }
            ReplicationError::Io(e) => AppError::with_source(ErrorKind::Storage, "I/O failure", e),
            _ => AppError::internal(err.to_string()),
        }
    }
}
