//! Reference-graph collection.
//!
//! The graph is an explicit `path -> node` set built once from the engine's
//! transitive reference query. Handles stay open in the session so the
//! graph-copy phase can rely on engine auto-relinking.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use designcopy_core::types::{DocumentHandle, DocumentKind};
use tracing::{debug, info};

use crate::error::ReplicationError;
use crate::filesystem::FsUtils;
use crate::models::{DocumentNode, Scope};
use crate::session::EngineSession;

/// Documents reachable from a root, root first.
#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    /// Root document.
    pub root: PathBuf,
    /// Every reachable document, deduplicated by normalized path.
    pub nodes: Vec<DocumentNode>,
}

impl ReferenceGraph {
    /// Number of documents, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Walks the engine's reference closure from a root document.
pub struct ReferenceGraphCollector<'a> {
    session: &'a EngineSession,
    visible: bool,
}

impl<'a> ReferenceGraphCollector<'a> {
    /// Create a collector over a session.
    pub fn new(session: &'a EngineSession, visible: bool) -> Self {
        Self { session, visible }
    }

    /// Open the root and collect its transitive reference set.
    ///
    /// Any failure here is a discovery error: without the graph nothing can
    /// be replicated.
    pub async fn collect(&self, root: &Path) -> Result<ReferenceGraph, ReplicationError> {
        let discovery = |e: ReplicationError| match e {
            e if e.aborts_batch() => e,
            e => ReplicationError::Discovery {
                path: root.to_path_buf(),
                reason: e.to_string(),
            },
        };

        let root_handle = self
            .session
            .open(root, self.visible)
            .await
            .map_err(discovery)?;
        let referenced = self
            .session
            .all_referenced_documents(root_handle)
            .await
            .map_err(discovery)?;

        let handles: Vec<DocumentHandle> =
            std::iter::once(root_handle).chain(referenced).collect();
        let described: Vec<(DocumentHandle, PathBuf, DocumentKind)> = self
            .session
            .call(move |engine| {
                handles
                    .into_iter()
                    .map(|h| Ok((h, engine.full_path(h)?, engine.kind(h)?)))
                    .collect()
            })
            .await
            .map_err(discovery)?;

        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(described.len());
        for (handle, path, kind) in described {
            if !seen.insert(FsUtils::normalize_key(&path)) {
                debug!(path = %path.display(), "Duplicate document in reference set");
                continue;
            }
            nodes.push(DocumentNode {
                path,
                kind,
                handle: Some(handle),
                scope: Scope::InScope,
                is_root: handle == root_handle,
            });
        }

        info!(root = %root.display(), documents = nodes.len(), "Reference graph collected");
        Ok(ReferenceGraph {
            root: root.to_path_buf(),
            nodes,
        })
    }
}
