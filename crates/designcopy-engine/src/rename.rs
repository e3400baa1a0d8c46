//! Rename resolution.
//!
//! [`RenameResolver::resolve`] is a pure function of a file's **original**
//! identity. Calling it again with the same input yields the same name, so
//! prefixes and suffixes never compound.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use designcopy_core::config::ReplicationConfig;
use regex::Regex;

use crate::error::ReplicationError;
use crate::filesystem::FsUtils;
use crate::models::{ProjectSource, RenameDirectives, ReplicationRequest};

/// Maps original file identities to destination file names.
#[derive(Debug, Clone)]
pub struct RenameResolver {
    by_path: HashMap<String, String>,
    /// `None` marks a filename claimed by several overrides.
    by_name: HashMap<String, Option<String>>,
    directives: RenameDirectives,
    project_id: String,
    assembly_extension: String,
    descriptor_extension: String,
    source_root: PathBuf,
    source_kind: ProjectSource,
    descriptor_patterns: Vec<Regex>,
}

impl RenameResolver {
    /// Build a resolver for one request.
    pub fn new(
        request: &ReplicationRequest,
        config: &ReplicationConfig,
    ) -> Result<Self, ReplicationError> {
        let descriptor_patterns = config
            .descriptor_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_path = HashMap::new();
        let mut by_name: HashMap<String, Option<String>> = HashMap::new();

        for rename in &request.renames.overrides {
            let new_name = rename.new_file_name.trim().to_string();
            if new_name.is_empty() {
                continue;
            }

            let name_key = FsUtils::file_name_str(&rename.original_path).to_lowercase();
            if rename.original_path.parent().is_some_and(|p| !p.as_os_str().is_empty()) {
                by_path.insert(
                    FsUtils::normalize_key(&rename.original_path),
                    new_name.clone(),
                );
            }

            by_name
                .entry(name_key)
                .and_modify(|existing| {
                    if existing.as_deref() != Some(new_name.as_str()) {
                        *existing = None;
                    }
                })
                .or_insert(Some(new_name));
        }

        Ok(Self {
            by_path,
            by_name,
            directives: request.renames.clone(),
            project_id: request.project_id.clone(),
            assembly_extension: config.assembly_extension.trim_start_matches('.').to_string(),
            descriptor_extension: config
                .descriptor_extension
                .trim_start_matches('.')
                .to_string(),
            source_root: request.source_root.clone(),
            source_kind: request.source_kind,
            descriptor_patterns,
        })
    }

    /// Resolve the destination file name for a source file.
    pub fn resolve(&self, original_path: &Path, is_root: bool) -> String {
        if is_root {
            return self.top_assembly_name();
        }

        let file_name = FsUtils::file_name_str(original_path);
        if let Some(name) = self.by_path.get(&FsUtils::normalize_key(original_path)) {
            return name.clone();
        }
        if let Some(Some(name)) = self.by_name.get(&file_name.to_lowercase()) {
            return name.clone();
        }

        if self.is_workspace_descriptor(original_path) {
            return self.descriptor_name();
        }

        self.apply_global_rules(&file_name)
    }

    /// Resolve a bare file name: overrides by name, then the global rules.
    pub fn resolve_name(&self, file_name: &str) -> String {
        if let Some(Some(name)) = self.by_name.get(&file_name.to_lowercase()) {
            return name.clone();
        }
        self.apply_global_rules(file_name)
    }

    /// Destination path of a source file. The top assembly always lands
    /// directly under the destination root.
    pub fn destination_for(
        &self,
        original_path: &Path,
        destination_root: &Path,
        is_root: bool,
    ) -> PathBuf {
        if is_root {
            return destination_root.join(self.top_assembly_name());
        }
        let relative = FsUtils::relative_dir(original_path, &self.source_root).unwrap_or_default();
        destination_root
            .join(relative)
            .join(self.resolve(original_path, is_root))
    }

    /// `{projectId}.{assemblyExt}`.
    pub fn top_assembly_name(&self) -> String {
        format!("{}.{}", self.project_id, self.assembly_extension)
    }

    /// `{projectId}.{descriptorExt}`.
    pub fn descriptor_name(&self) -> String {
        format!("{}.{}", self.project_id, self.descriptor_extension)
    }

    /// Whether the path is the primary workspace descriptor of the source
    /// tree. Only descriptors directly at the source root qualify; in
    /// template mode the stem must also match a configured pattern.
    pub fn is_workspace_descriptor(&self, path: &Path) -> bool {
        if !FsUtils::has_extension(path, &self.descriptor_extension) {
            return false;
        }
        let at_root = path
            .parent()
            .is_some_and(|parent| FsUtils::same_path(parent, &self.source_root));
        if !at_root {
            return false;
        }

        match self.source_kind {
            ProjectSource::ExistingProject => true,
            ProjectSource::Template => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.descriptor_patterns.iter().any(|re| re.is_match(&stem))
            }
        }
    }

    fn apply_global_rules(&self, file_name: &str) -> String {
        let path = Path::new(file_name);
        let (stem, ext) = match (path.file_stem(), path.extension()) {
            (Some(stem), Some(ext)) => (
                stem.to_string_lossy().into_owned(),
                Some(ext.to_string_lossy().into_owned()),
            ),
            _ => (file_name.to_string(), None),
        };

        let replaced = match self.directives.search.as_deref() {
            Some(search) if !search.is_empty() => stem.replace(search, &self.directives.replace),
            _ => stem,
        };
        let stem = format!(
            "{}{}{}",
            self.directives.prefix, replaced, self.directives.suffix
        );

        match ext {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileRename;

    fn request() -> ReplicationRequest {
        ReplicationRequest::new("/src/Module", "/dst", "123450101")
    }

    fn resolver(request: &ReplicationRequest) -> RenameResolver {
        RenameResolver::new(request, &ReplicationConfig::default()).expect("resolver")
    }

    #[test]
    fn test_identity_without_directives() {
        let r = resolver(&request());
        assert_eq!(r.resolve(Path::new("/src/Module/A.ipt"), false), "A.ipt");
    }

    #[test]
    fn test_override_by_path_beats_filename() {
        let mut req = request();
        req.renames.overrides = vec![
            FileRename {
                original_path: PathBuf::from("/src/Module/Sub/C.ipt"),
                new_file_name: "C_v2.ipt".into(),
            },
            FileRename {
                original_path: PathBuf::from("D.ipt"),
                new_file_name: "D_new.ipt".into(),
            },
        ];
        let r = resolver(&req);
        assert_eq!(r.resolve(Path::new("/SRC/module/sub/c.ipt"), false), "C_v2.ipt");
        assert_eq!(r.resolve(Path::new("/src/Module/Other/D.ipt"), false), "D_new.ipt");
    }

    #[test]
    fn test_ambiguous_filename_override_is_ignored() {
        let mut req = request();
        req.renames.overrides = vec![
            FileRename {
                original_path: PathBuf::from("/src/Module/X/P.ipt"),
                new_file_name: "P1.ipt".into(),
            },
            FileRename {
                original_path: PathBuf::from("/src/Module/Y/P.ipt"),
                new_file_name: "P2.ipt".into(),
            },
        ];
        let r = resolver(&req);
        assert_eq!(r.resolve(Path::new("/src/Module/X/P.ipt"), false), "P1.ipt");
        assert_eq!(r.resolve(Path::new("/src/Module/Z/P.ipt"), false), "P.ipt");
    }

    #[test]
    fn test_top_assembly_rule() {
        let mut req = request();
        req.renames.prefix = "NEW_".into();
        let r = resolver(&req);
        assert_eq!(r.resolve(Path::new("/src/Module/Module_.iam"), true), "123450101.iam");
    }

    #[test]
    fn test_top_assembly_rule_beats_overrides() {
        let mut req = request();
        req.renames.overrides = vec![FileRename {
            original_path: PathBuf::from("/src/Module/Module_.iam"),
            new_file_name: "Custom.iam".into(),
        }];
        let r = resolver(&req);
        assert_eq!(r.resolve(Path::new("/src/Module/Module_.iam"), true), "123450101.iam");
        assert_eq!(r.resolve(Path::new("/src/Module/Module_.iam"), false), "Custom.iam");
    }

    #[test]
    fn test_top_assembly_in_subfolder_lands_at_destination_root() {
        let r = resolver(&request());
        assert_eq!(
            r.destination_for(Path::new("/src/Module/Assy/Main.iam"), Path::new("/dst"), true),
            PathBuf::from("/dst/123450101.iam")
        );
    }

    #[test]
    fn test_descriptor_rule_template_mode() {
        let r = resolver(&request());
        assert_eq!(
            r.resolve(Path::new("/src/Module/Module_2024.ipj"), false),
            "123450101.ipj"
        );
        assert_eq!(r.resolve(Path::new("/src/Module/Library.ipj"), false), "Library.ipj");
        assert_eq!(
            r.resolve(Path::new("/src/Module/Sub/Module_2024.ipj"), false),
            "Module_2024.ipj"
        );
    }

    #[test]
    fn test_descriptor_rule_existing_project_mode() {
        let mut req = request();
        req.source_kind = ProjectSource::ExistingProject;
        let r = resolver(&req);
        assert_eq!(r.resolve(Path::new("/src/Module/Library.ipj"), false), "123450101.ipj");
    }

    #[test]
    fn test_global_rules_apply_to_stem_and_are_idempotent() {
        let mut req = request();
        req.renames.prefix = "P_".into();
        req.renames.suffix = "_S".into();
        req.renames.search = Some("Old".into());
        req.renames.replace = "New".into();
        let r = resolver(&req);

        let original = Path::new("/src/Module/OldBracket.ipt");
        let first = r.resolve(original, false);
        let second = r.resolve(original, false);
        assert_eq!(first, "P_NewBracket_S.ipt");
        assert_eq!(first, second);
    }

    #[test]
    fn test_destination_keeps_relative_directory() {
        let r = resolver(&request());
        assert_eq!(
            r.destination_for(Path::new("/src/Module/Sub/A.ipt"), Path::new("/dst"), false),
            PathBuf::from("/dst/Sub/A.ipt")
        );
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = ReplicationConfig {
            descriptor_patterns: vec!["(".into()],
            ..Default::default()
        };
        assert!(matches!(
            RenameResolver::new(&request(), &config),
            Err(ReplicationError::Pattern(_))
        ));
    }
}
