//! Scope partitioning of discovered documents.

use std::path::{Path, PathBuf};

use crate::filesystem::FsUtils;
use crate::models::{DocumentNode, Scope};

/// Classifies paths as in-scope or external-library.
#[derive(Debug, Clone)]
pub struct PathPartitioner {
    source_root: PathBuf,
    excluded_subtrees: Vec<PathBuf>,
}

impl PathPartitioner {
    /// Create a partitioner. `excluded_subtrees` must already be absolute.
    pub fn new(source_root: impl Into<PathBuf>, excluded_subtrees: Vec<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            excluded_subtrees,
        }
    }

    /// Scope of a single path. Excluded subtrees are external even when
    /// they sit under the source root.
    pub fn classify(&self, path: &Path) -> Scope {
        if !FsUtils::is_under(path, &self.source_root) || self.is_excluded(path) {
            Scope::ExternalLibrary
        } else {
            Scope::InScope
        }
    }

    /// Whether the path lies in an excluded subtree.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded_subtrees
            .iter()
            .any(|root| FsUtils::is_under(path, root))
    }

    /// Assign scopes and split into `(in_scope, external)`.
    pub fn partition(&self, nodes: Vec<DocumentNode>) -> (Vec<DocumentNode>, Vec<DocumentNode>) {
        nodes
            .into_iter()
            .map(|mut node| {
                node.scope = self.classify(&node.path);
                node
            })
            .partition(|node| node.scope == Scope::InScope)
    }
}
