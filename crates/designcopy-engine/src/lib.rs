//! # designcopy-engine
//!
//! Replicates a CAD design tree from a source root to a destination root
//! under a new project identity. The engine walks the reference graph of a
//! top assembly through an [`AuthoringEngine`](designcopy_core::traits::AuthoringEngine),
//! saves every in-scope document at its resolved destination, sweeps
//! drawings, orphans and non-CAD files, rewrites stored references, and
//! relocates the workspace descriptor.
//!
//! All engine calls go through a single [`EngineSession`] worker so the
//! underlying application is never touched from two threads.

pub mod context;
pub mod error;
pub mod executor;
pub mod filesystem;
pub mod graph;
pub mod ledger;
pub mod manifest;
pub mod metrics;
pub mod models;
pub mod noncad;
pub mod orchestrator;
pub mod orphan;
pub mod partition;
pub mod progress;
pub mod rename;
pub mod rewrite;
pub mod schedule;
pub mod session;
pub mod workspace;

pub use error::ReplicationError;
pub use manifest::{ManifestDocument, ManifestEngine, ManifestReference};
pub use metrics::{MetricsSnapshot, ReplicationMetrics};
pub use models::{
    CopyPhase, CopyRecord, FileRename, ModuleMetadata, ModuleNumber, ProjectSource,
    PropertyStamp, RenameDirectives, ReplicationPlan, ReplicationRequest, ReplicationResult,
    ReplicationState, Severity,
};
pub use orchestrator::{Orchestrator, destination_is_populated, discover_top_assembly};
pub use progress::{CallbackProgress, NullProgress, ProgressSink};
pub use rename::RenameResolver;
pub use session::EngineSession;
