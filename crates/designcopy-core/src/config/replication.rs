//! Replication engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Configuration for the design-tree replication engine.
///
/// Every field has a default so an empty `[replication]` section (or no
/// section at all) yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Shared-catalog subtrees that are never duplicated, even when they sit
    /// under the source root. Relative entries are resolved against the
    /// source root of each run.
    pub excluded_subtrees: Vec<PathBuf>,

    /// Folder names skipped by every filesystem scan (vault working folders,
    /// old-version archives).
    pub excluded_folder_names: Vec<String>,

    /// Extensions (without the dot) of vault temp and backup files.
    pub temp_extensions: Vec<String>,

    /// Extension of assembly documents, used for the top-assembly name.
    #[validate(length(min = 1, max = 16))]
    pub assembly_extension: String,

    /// Extension of the workspace descriptor.
    #[validate(length(min = 1, max = 16))]
    pub descriptor_extension: String,

    /// File name of a template's top assembly.
    #[validate(length(min = 1))]
    pub template_top_assembly: String,

    /// Regexes recognising the primary workspace descriptor of a template.
    pub descriptor_patterns: Vec<String>,

    /// Descriptor file, or a directory holding one, cloned when the source
    /// tree carries no descriptor of its own.
    pub fallback_descriptor_template: Option<PathBuf>,

    /// Whether documents are opened visibly in the authoring engine.
    pub open_visible: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            excluded_subtrees: Vec::new(),
            excluded_folder_names: default_excluded_folder_names(),
            temp_extensions: default_temp_extensions(),
            assembly_extension: "iam".to_string(),
            descriptor_extension: "ipj".to_string(),
            template_top_assembly: "Module_.iam".to_string(),
            descriptor_patterns: default_descriptor_patterns(),
            fallback_descriptor_template: None,
            open_visible: false,
        }
    }
}

fn default_excluded_folder_names() -> Vec<String> {
    vec!["_V".to_string(), "OldVersions".to_string()]
}

fn default_temp_extensions() -> Vec<String> {
    vec!["v".to_string(), "vbak".to_string(), "bak".to_string()]
}

fn default_descriptor_patterns() -> Vec<String> {
    vec![
        r"_20\d\d".to_string(),
        r"^\d{5}-\d{2}-\d{2}".to_string(),
        r"(?i)module".to_string(),
        r"^\d{9}$".to_string(),
    ]
}

impl ReplicationConfig {
    /// Resolve the excluded subtrees against a source root.
    pub fn excluded_subtrees_under(&self, source_root: &Path) -> Vec<PathBuf> {
        self.excluded_subtrees
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    source_root.join(p)
                }
            })
            .collect()
    }
}
