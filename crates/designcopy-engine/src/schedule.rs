//! Bottom-up copy ordering.

use designcopy_core::types::DocumentKind;

use crate::filesystem::FsUtils;
use crate::models::DocumentNode;

/// Parts first.
pub const PART_PRIORITY: u32 = 0;
/// Then assemblies.
pub const ASSEMBLY_PRIORITY: u32 = 1;
/// Then any other engine document.
pub const OTHER_PRIORITY: u32 = 2;
/// The top assembly always goes last.
pub const TOP_ASSEMBLY_PRIORITY: u32 = 100;

/// Orders in-scope graph nodes for sequential replication.
pub struct CopyScheduler;

impl CopyScheduler {
    /// Priority of a node, `None` for drawings, which are handled by their
    /// own phase.
    pub fn priority(node: &DocumentNode) -> Option<u32> {
        if node.is_root {
            return Some(TOP_ASSEMBLY_PRIORITY);
        }
        match node.kind {
            DocumentKind::Part => Some(PART_PRIORITY),
            DocumentKind::Assembly => Some(ASSEMBLY_PRIORITY),
            DocumentKind::Other => Some(OTHER_PRIORITY),
            DocumentKind::Drawing => None,
        }
    }

    /// Drop drawings and sort by priority, then by path for a stable order.
    pub fn schedule(nodes: Vec<DocumentNode>) -> Vec<DocumentNode> {
        let mut keyed: Vec<(u32, String, DocumentNode)> = nodes
            .into_iter()
            .filter_map(|node| {
                Self::priority(&node)
                    .map(|p| (p, FsUtils::normalize_key(&node.path), node))
            })
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        keyed.into_iter().map(|(_, _, node)| node).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;
    use std::path::PathBuf;

    fn node(path: &str, kind: DocumentKind, is_root: bool) -> DocumentNode {
        DocumentNode {
            path: PathBuf::from(path),
            kind,
            handle: None,
            scope: Scope::InScope,
            is_root,
        }
    }

    #[test]
    fn test_schedule_is_bottom_up_with_root_last() {
        let ordered = CopyScheduler::schedule(vec![
            node("/src/Root.iam", DocumentKind::Assembly, true),
            node("/src/B.iam", DocumentKind::Assembly, false),
            node("/src/Sheet.idw", DocumentKind::Drawing, false),
            node("/src/Z.ipt", DocumentKind::Part, false),
            node("/src/A.ipt", DocumentKind::Part, false),
            node("/src/P.ipn", DocumentKind::Other, false),
        ]);

        let paths: Vec<&str> = ordered
            .iter()
            .map(|n| n.path.to_str().expect("utf8"))
            .collect();
        assert_eq!(
            paths,
            vec![
                "/src/A.ipt",
                "/src/Z.ipt",
                "/src/B.iam",
                "/src/P.ipn",
                "/src/Root.iam"
            ]
        );
    }

    #[test]
    fn test_drawings_have_no_priority() {
        let drawing = node("/src/Sheet.dwg", DocumentKind::Drawing, false);
        assert_eq!(CopyScheduler::priority(&drawing), None);
    }
}
