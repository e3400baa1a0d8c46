//! Authoring-engine capability trait.
//!
//! The authoring engine is the external CAD application that owns document
//! state and reference semantics. The replication engine consumes it only
//! through this trait and never inspects geometry.
//!
//! Implementations are stateful and non-reentrant: one logical working set
//! of open documents exists at a time. Methods therefore take `&mut self`
//! and callers serialise every call through a single owner.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::{DocumentHandle, DocumentKind};

/// A reference descriptor stored inside a document.
///
/// Descriptors survive in the file even when the referenced component is
/// suppressed or deleted from the live tree, which is why they are listed
/// separately from [`AuthoringEngine::all_referenced_documents`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    /// Position of the descriptor inside the owning document.
    pub index: usize,
    /// Absolute path the descriptor currently points at.
    pub path: PathBuf,
}

/// Property groups that can be stamped on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertySet {
    /// Design-tracking properties (part number, project, ...).
    DesignTracking,
    /// Summary information (title, author, ...).
    Summary,
    /// User-defined custom properties.
    Custom,
    /// Text user parameters of an assembly.
    UserParameter,
}

impl fmt::Display for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DesignTracking => write!(f, "design_tracking"),
            Self::Summary => write!(f, "summary"),
            Self::Custom => write!(f, "custom"),
            Self::UserParameter => write!(f, "user_parameter"),
        }
    }
}

/// Trait for authoring-engine sessions.
pub trait AuthoringEngine: Send {
    /// Human-readable engine name used in logs.
    fn name(&self) -> &str;

    /// Open a document. Opening an already-open document returns its
    /// existing handle.
    fn open(&mut self, path: &Path, visible: bool) -> AppResult<DocumentHandle>;

    /// Load and return every document transitively referenced by `handle`
    /// through its live (non-suppressed) components. The document itself is
    /// not included.
    fn all_referenced_documents(&mut self, handle: DocumentHandle)
    -> AppResult<Vec<DocumentHandle>>;

    /// Absolute path of an open document.
    fn full_path(&self, handle: DocumentHandle) -> AppResult<PathBuf>;

    /// Kind of an open document.
    fn kind(&self, handle: DocumentHandle) -> AppResult<DocumentKind>;

    /// Save the document under a new path. The handle then refers to the
    /// new file, and other open documents referencing the old path are
    /// relinked to it in memory.
    fn save_as(&mut self, handle: DocumentHandle, new_path: &Path) -> AppResult<()>;

    /// Every reference descriptor stored in the document, live or not.
    fn file_references(&self, handle: DocumentHandle) -> AppResult<Vec<FileReference>>;

    /// Point a stored descriptor at a new file.
    fn redirect_file_reference(
        &mut self,
        handle: DocumentHandle,
        reference: &FileReference,
        new_path: &Path,
    ) -> AppResult<()>;

    /// Set a property, creating it when missing.
    fn set_property(
        &mut self,
        handle: DocumentHandle,
        set: PropertySet,
        name: &str,
        value: &str,
    ) -> AppResult<()>;

    /// Rebuild the document.
    fn update(&mut self, handle: DocumentHandle) -> AppResult<()>;

    /// Save the document in place.
    fn save(&mut self, handle: DocumentHandle) -> AppResult<()>;

    /// Close a document, optionally saving it first.
    fn close(&mut self, handle: DocumentHandle, save: bool) -> AppResult<()>;

    /// Close every open document without saving.
    fn close_all(&mut self) -> AppResult<()>;

    /// Make `descriptor` the active workspace context.
    fn switch_workspace_context(&mut self, descriptor: &Path) -> AppResult<()>;

    /// The currently active workspace descriptor, if any.
    fn active_workspace_context(&self) -> AppResult<Option<PathBuf>>;
}
