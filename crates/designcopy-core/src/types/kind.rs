//! Document kinds recognised by the replication engine.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

macro_rules! define_document_kinds {
    ($($ext:literal => $variant:ident),* $(,)?) => {
        static EXTENSION_MAP: LazyLock<HashMap<&'static str, DocumentKind>> = LazyLock::new(|| {
            HashMap::from([$(($ext, DocumentKind::$variant),)*])
        });

        impl DocumentKind {
            /// Every file extension handled by the authoring engine.
            pub const CAD_EXTENSIONS: &'static [&'static str] = &[$($ext,)*];
        }
    };
}

define_document_kinds! {
    "ipt" => Part,
    "iam" => Assembly,
    "idw" => Drawing,
    "dwg" => Drawing,
    "ipn" => Other,
}

/// Closed set of document kinds. Capability checks branch on this tag
/// rather than probing engine objects at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// A single part.
    Part,
    /// An assembly of parts and sub-assemblies.
    Assembly,
    /// A drawing sheet set; references assemblies and parts.
    Drawing,
    /// Any other authoring-engine document (presentations, etc.).
    Other,
}

impl DocumentKind {
    /// Determine the kind from a file path's extension. Returns `None` for
    /// files the authoring engine does not own.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        EXTENSION_MAP.get(ext.as_str()).copied()
    }

    /// Returns `true` if the path names an authoring-engine document.
    pub fn is_cad_file(path: &Path) -> bool {
        Self::from_path(path).is_some()
    }

    /// Whether stored references of this kind are patched by the final
    /// rewrite pass.
    pub fn is_rewritable(&self) -> bool {
        matches!(self, Self::Assembly | Self::Drawing)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Part => write!(f, "part"),
            Self::Assembly => write!(f, "assembly"),
            Self::Drawing => write!(f, "drawing"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension_is_case_insensitive() {
        assert_eq!(DocumentKind::from_path(Path::new("A.IPT")), Some(DocumentKind::Part));
        assert_eq!(
            DocumentKind::from_path(Path::new("/x/Root.iam")),
            Some(DocumentKind::Assembly)
        );
        assert_eq!(DocumentKind::from_path(Path::new("s.dwg")), Some(DocumentKind::Drawing));
        assert_eq!(DocumentKind::from_path(Path::new("p.ipn")), Some(DocumentKind::Other));
    }

    #[test]
    fn test_non_cad_files() {
        assert!(DocumentKind::from_path(Path::new("notes.pdf")).is_none());
        assert!(DocumentKind::from_path(Path::new("project.ipj")).is_none());
        assert!(DocumentKind::from_path(Path::new("noext")).is_none());
        assert!(!DocumentKind::is_cad_file(Path::new("a.xlsx")));
    }

    #[test]
    fn test_only_assemblies_and_drawings_are_rewritable() {
        assert!(!DocumentKind::Part.is_rewritable());
        assert!(!DocumentKind::Other.is_rewritable());
        assert!(DocumentKind::Assembly.is_rewritable());
        assert!(DocumentKind::Drawing.is_rewritable());
    }
}
