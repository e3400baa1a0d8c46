//! Domain models: requests, directives, document nodes, copy records,
//! run results, and module numbering.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use designcopy_core::traits::PropertySet;
use designcopy_core::types::{DocumentHandle, DocumentKind, RunId};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Where the source tree comes from. Drives descriptor recognition and the
/// top-assembly fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectSource {
    /// A module template; only descriptors matching the configured patterns
    /// are renamed.
    #[default]
    Template,
    /// An existing project; any descriptor at the source root is renamed.
    ExistingProject,
}

/// Exact-name override for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRename {
    /// Source file, absolute. A bare file name acts as a filename-only key.
    pub original_path: PathBuf,
    /// New file name, extension included.
    pub new_file_name: String,
}

/// Rename directives applied by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameDirectives {
    /// Per-file overrides.
    pub overrides: Vec<FileRename>,
    /// Global prefix added to every stem.
    pub prefix: String,
    /// Global suffix added to every stem.
    pub suffix: String,
    /// Global search text. Empty or missing disables search/replace.
    pub search: Option<String>,
    /// Replacement for `search`.
    pub replace: String,
}

/// A property stamped on the final top assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyStamp {
    /// Property group.
    pub set: PropertySet,
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: String,
}

impl PropertyStamp {
    /// Build a stamp.
    pub fn new(set: PropertySet, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            set,
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A replication request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReplicationRequest {
    /// Root of the source design tree.
    pub source_root: PathBuf,
    /// Root of the destination tree.
    pub destination_root: PathBuf,
    /// Top assembly. Discovered under `source_root` when missing.
    #[serde(default)]
    pub top_assembly: Option<PathBuf>,
    /// Identifier naming the top assembly and the workspace descriptor.
    #[validate(length(min = 1, max = 128), custom(function = "validate_file_stem"))]
    pub project_id: String,
    /// Source mode.
    #[serde(default)]
    pub source_kind: ProjectSource,
    /// Rename directives.
    #[serde(default)]
    pub renames: RenameDirectives,
    /// Properties stamped on the final top assembly.
    #[serde(default)]
    pub metadata: Vec<PropertyStamp>,
}

impl ReplicationRequest {
    /// Create a request with default directives and no metadata.
    pub fn new(
        source_root: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            top_assembly: None,
            project_id: project_id.into(),
            source_kind: ProjectSource::default(),
            renames: RenameDirectives::default(),
            metadata: Vec::new(),
        }
    }
}

fn validate_file_stem(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
    {
        return Err(ValidationError::new("invalid_file_stem"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Module numbering
// ---------------------------------------------------------------------------

/// Project / reference / module triple identifying a replicated module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ModuleNumber {
    /// Project number, 4 to 6 digits.
    #[validate(custom(function = "validate_project_digits"))]
    pub project: String,
    /// Reference number.
    #[validate(custom(function = "validate_digits"))]
    pub reference: String,
    /// Module number.
    #[validate(custom(function = "validate_digits"))]
    pub module: String,
}

impl ModuleNumber {
    /// Build a module number.
    pub fn new(
        project: impl Into<String>,
        reference: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            reference: reference.into(),
            module: module.into(),
        }
    }

    /// Full number: project padded to 5 digits, reference and module to 2.
    pub fn full(&self) -> String {
        format!(
            "{:0>5}{:0>2}{:0>2}",
            self.project, self.reference, self.module
        )
    }

    /// Conventional destination folder: `base/{project}/REF{rr}/M{mm}`.
    pub fn destination_under(&self, base: &Path) -> PathBuf {
        base.join(&self.project)
            .join(format!("REF{:0>2}", self.reference))
            .join(format!("M{:0>2}", self.module))
    }
}

impl fmt::Display for ModuleNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full())
    }
}

fn validate_digits(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("not_digits"));
    }
    Ok(())
}

fn validate_project_digits(value: &str) -> Result<(), ValidationError> {
    validate_digits(value)?;
    if !(4..=6).contains(&value.len()) {
        return Err(ValidationError::new("project_length"));
    }
    Ok(())
}

/// Identifying metadata stamped on a new module's top assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Module number.
    pub number: ModuleNumber,
    /// Designer initials.
    pub designer: String,
    /// Co-designer initials.
    #[serde(default)]
    pub co_designer: String,
    /// Creation date.
    pub creation_date: NaiveDate,
    /// Optional job title.
    #[serde(default)]
    pub job_title: Option<String>,
}

impl ModuleMetadata {
    /// The standard set of stamps for a new module: design-tracking,
    /// summary and custom properties plus the matching `*_Form` user
    /// parameters.
    pub fn standard(&self) -> Vec<PropertyStamp> {
        let full = self.number.full();
        let date = self.creation_date.format("%Y-%m-%d").to_string();
        let mut stamps = vec![
            PropertyStamp::new(PropertySet::DesignTracking, "Part Number", &full),
            PropertyStamp::new(PropertySet::DesignTracking, "Project", &self.number.project),
            PropertyStamp::new(PropertySet::Summary, "Title", &full),
            PropertyStamp::new(PropertySet::Summary, "Author", &self.designer),
        ];

        let custom = [
            ("Project", self.number.project.as_str()),
            ("Reference", self.number.reference.as_str()),
            ("Module", self.number.module.as_str()),
            ("Numero_de_Projet", full.as_str()),
            ("Initiale_du_Dessinateur", self.designer.as_str()),
            ("Initiale_du_Co_Dessinateur", self.co_designer.as_str()),
            ("Creation_Date", date.as_str()),
        ];
        stamps.extend(
            custom
                .iter()
                .map(|(name, value)| PropertyStamp::new(PropertySet::Custom, *name, *value)),
        );

        let params = [
            ("Project_Form", self.number.project.as_str()),
            ("Reference_Form", self.number.reference.as_str()),
            ("Module_Form", self.number.module.as_str()),
            ("Numero_Form", full.as_str()),
            ("Initiale_du_Dessinateur_Form", self.designer.as_str()),
            ("Initiale_du_Co_Dessinateur_Form", self.co_designer.as_str()),
            ("Creation_Date_Form", date.as_str()),
        ];
        stamps.extend(
            params
                .iter()
                .map(|(name, value)| PropertyStamp::new(PropertySet::UserParameter, *name, *value)),
        );

        if let Some(title) = self.job_title.as_deref().filter(|t| !t.is_empty()) {
            stamps.push(PropertyStamp::new(PropertySet::Custom, "Job_Title", title));
            stamps.push(PropertyStamp::new(
                PropertySet::UserParameter,
                "Job_Title_Form",
                title,
            ));
        }

        stamps
    }
}

// ---------------------------------------------------------------------------
// Graph nodes
// ---------------------------------------------------------------------------

/// Partition of a document relative to the source root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Copied, renamed and rewritten.
    InScope,
    /// Left untouched.
    ExternalLibrary,
}

/// A document discovered by the graph walk or a filesystem scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    /// Absolute path as reported by the engine.
    pub path: PathBuf,
    /// Document kind.
    pub kind: DocumentKind,
    /// Handle while the document is open in the session.
    pub handle: Option<DocumentHandle>,
    /// Scope assigned by the partitioner.
    pub scope: Scope,
    /// Whether this is the top assembly.
    pub is_root: bool,
}

// ---------------------------------------------------------------------------
// Records and results
// ---------------------------------------------------------------------------

/// Phase that produced a copy record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyPhase {
    /// Engine save-as of a graph node.
    Graph,
    /// Engine save-as of a drawing.
    Drawing,
    /// Plain copy of an unreachable CAD file.
    Orphan,
    /// Plain copy of a non-CAD file.
    NonCad,
    /// Workspace descriptor relocation.
    Descriptor,
}

impl fmt::Display for CopyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Graph => "graph",
            Self::Drawing => "drawing",
            Self::Orphan => "orphan",
            Self::NonCad => "non_cad",
            Self::Descriptor => "descriptor",
        };
        write!(f, "{s}")
    }
}

/// Outcome of replicating one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRecord {
    /// Source path.
    pub original_path: PathBuf,
    /// Source file name.
    pub original_file_name: String,
    /// Destination path.
    pub new_path: PathBuf,
    /// Destination file name.
    pub new_file_name: String,
    /// Whether the copy was written.
    pub success: bool,
    /// Failure reason.
    pub error_message: Option<String>,
    /// Whether the file is the top assembly.
    pub is_top_assembly: bool,
    /// Whether metadata was stamped on this file.
    pub properties_applied: bool,
    /// Producing phase.
    pub phase: CopyPhase,
    /// Document kind, `None` for non-CAD files.
    pub kind: Option<DocumentKind>,
}

impl CopyRecord {
    /// Successful record.
    pub fn succeeded(
        original_path: &Path,
        new_path: &Path,
        phase: CopyPhase,
        kind: Option<DocumentKind>,
    ) -> Self {
        Self {
            original_path: original_path.to_path_buf(),
            original_file_name: file_name_of(original_path),
            new_path: new_path.to_path_buf(),
            new_file_name: file_name_of(new_path),
            success: true,
            error_message: None,
            is_top_assembly: false,
            properties_applied: false,
            phase,
            kind,
        }
    }

    /// Failed record.
    pub fn failed(
        original_path: &Path,
        new_path: &Path,
        phase: CopyPhase,
        kind: Option<DocumentKind>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error_message: Some(error.into()),
            ..Self::succeeded(original_path, new_path, phase, kind)
        }
    }

    /// Flag the record as the top assembly.
    pub fn top_assembly(mut self, is_top: bool) -> Self {
        self.is_top_assembly = is_top;
        self
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationState {
    /// Not started.
    Idle,
    /// Activating the source workspace and creating folders.
    Preparing,
    /// Saving graph nodes bottom-up.
    GraphCopy,
    /// Saving drawings.
    DrawingCopy,
    /// Copying unreachable CAD files.
    OrphanCopy,
    /// Patching stored references.
    ReferenceRewrite,
    /// Copying non-CAD files.
    NonCadCopy,
    /// Relocating the workspace descriptor.
    DescriptorRelocate,
    /// Stamping metadata on the new top assembly.
    Finalize,
    /// Completed.
    Done,
    /// Aborted.
    Failed,
}

impl fmt::Display for ReplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::GraphCopy => "graph_copy",
            Self::DrawingCopy => "drawing_copy",
            Self::OrphanCopy => "orphan_copy",
            Self::ReferenceRewrite => "reference_rewrite",
            Self::NonCadCopy => "non_cad_copy",
            Self::DescriptorRelocate => "descriptor_relocate",
            Self::Finalize => "finalize",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Diagnostic detail.
    Debug,
    /// Normal progress.
    Info,
    /// A step completed.
    Success,
    /// A non-fatal problem.
    Warning,
    /// A failure.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One caller-visible log line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp.
    pub at: DateTime<Utc>,
    /// Severity.
    pub severity: Severity,
    /// Message.
    pub message: String,
}

/// Final outcome of a replication run. Always returned, even on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationResult {
    /// Run identifier.
    pub run_id: RunId,
    /// No fatal error occurred and at least one file was copied.
    pub success: bool,
    /// Files written.
    pub files_copied: usize,
    /// Files that failed.
    pub files_failed: usize,
    /// Files skipped because the destination already existed.
    pub files_skipped: usize,
    /// Metadata stamps applied to the top assembly.
    pub properties_updated: usize,
    /// Destination root.
    pub destination_path: PathBuf,
    /// New top assembly, if it was written.
    pub top_assembly_path: Option<PathBuf>,
    /// Fatal error, if any.
    pub error_message: Option<String>,
    /// Per-file records.
    pub records: Vec<CopyRecord>,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
    /// Complete run log.
    pub log: Vec<LogEntry>,
    /// State the run ended in.
    pub final_state: ReplicationState,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// One destination computed by a dry run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedCopy {
    /// Source path.
    pub original_path: PathBuf,
    /// Destination path.
    pub new_path: PathBuf,
    /// Document kind.
    pub kind: DocumentKind,
    /// Copy priority (lower first); `None` for drawings.
    pub priority: Option<u32>,
    /// Whether the file is the top assembly.
    pub is_top_assembly: bool,
}

/// Result of a dry run: what a replication would write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationPlan {
    /// Top assembly used as the graph root.
    pub top_assembly: PathBuf,
    /// Graph nodes in copy order.
    pub graph: Vec<PlannedCopy>,
    /// Drawings found under the source root.
    pub drawings: Vec<PlannedCopy>,
    /// Referenced documents left untouched.
    pub external: Vec<PathBuf>,
}
