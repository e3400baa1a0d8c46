//! Filesystem utilities shared by every replication phase.
//!
//! Paths are compared through [`FsUtils::normalize_key`]: the authoring
//! engine reports paths with the casing and separators it likes, so all
//! lookups go through a lower-cased, forward-slash key.

use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::error::ReplicationError;

/// Filters applied by directory scans.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    /// Folder names skipped wherever they occur.
    pub excluded_folder_names: Vec<String>,
    /// Subtrees skipped entirely.
    pub excluded_subtrees: Vec<PathBuf>,
    /// Extensions of vault temp files.
    pub temp_extensions: Vec<String>,
}

impl ScanFilter {
    /// Whether the directory must not be entered.
    pub fn skips_dir(&self, dir: &Path) -> bool {
        let name_excluded = dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                self.excluded_folder_names
                    .iter()
                    .any(|ex| ex.eq_ignore_ascii_case(name))
            });
        name_excluded || self.is_excluded_subtree(dir)
    }

    /// Whether the path lies under an excluded subtree.
    pub fn is_excluded_subtree(&self, path: &Path) -> bool {
        self.excluded_subtrees
            .iter()
            .any(|root| FsUtils::is_under(path, root))
    }

    /// Whether the file is a vault temp or backup file.
    pub fn is_temp_file(&self, path: &Path) -> bool {
        FsUtils::is_vault_temp(path, &self.temp_extensions)
    }
}

/// Filesystem utility functions.
pub struct FsUtils;

impl FsUtils {
    /// Case-insensitive comparison key for a path.
    pub fn normalize_key(path: &Path) -> String {
        let s = path.to_string_lossy().replace('\\', "/").to_lowercase();
        let trimmed = s.trim_end_matches('/');
        if trimmed.is_empty() {
            s
        } else {
            trimmed.to_string()
        }
    }

    /// Whether two paths name the same file.
    pub fn same_path(a: &Path, b: &Path) -> bool {
        Self::normalize_key(a) == Self::normalize_key(b)
    }

    /// Whether `path` equals `root` or lies below it, on a separator
    /// boundary.
    pub fn is_under(path: &Path, root: &Path) -> bool {
        let path = Self::normalize_key(path);
        let root = Self::normalize_key(root);
        path == root
            || path
                .strip_prefix(&root)
                .is_some_and(|rest| rest.starts_with('/') || root.ends_with('/'))
    }

    /// Directory of `path` relative to `root`, or `None` when the path is
    /// not under `root`. Components are matched case-insensitively.
    pub fn relative_dir(path: &Path, root: &Path) -> Option<PathBuf> {
        let parent = path.parent()?;
        let root_parts: Vec<Component<'_>> = root.components().collect();
        let mut parts = parent.components();

        for expected in &root_parts {
            let actual = parts.next()?;
            let matches = actual
                .as_os_str()
                .to_string_lossy()
                .eq_ignore_ascii_case(&expected.as_os_str().to_string_lossy());
            if !matches {
                return None;
            }
        }

        Some(parts.collect())
    }

    /// File name as a `String`; empty for paths without one.
    pub fn file_name_str(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the extension (without dot) matches, ignoring case.
    pub fn has_extension(path: &Path, ext: &str) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext.trim_start_matches('.')))
    }

    /// Vault temp or backup file: extension in `temp_extensions`, or a
    /// numbered `.vN` backup.
    pub fn is_vault_temp(path: &Path, temp_extensions: &[String]) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if temp_extensions
            .iter()
            .any(|t| t.trim_start_matches('.').eq_ignore_ascii_case(ext))
        {
            return true;
        }
        let mut chars = ext.chars();
        matches!(chars.next(), Some('v' | 'V'))
            && ext.len() > 1
            && chars.all(|c| c.is_ascii_digit())
    }

    /// Every file under `root` accepted by the filter, sorted by path.
    pub async fn collect_files(
        root: &Path,
        filter: &ScanFilter,
    ) -> Result<Vec<PathBuf>, ReplicationError> {
        let mut files = Vec::new();
        let mut dirs_to_visit = vec![root.to_path_buf()];

        while let Some(current_dir) = dirs_to_visit.pop() {
            let mut entries = match tokio::fs::read_dir(&current_dir).await {
                Ok(e) => e,
                Err(e) => {
                    warn!(
                        dir = %current_dir.display(),
                        error = %e,
                        "Failed to read directory, skipping"
                    );
                    continue;
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    if !filter.skips_dir(&path) {
                        dirs_to_visit.push(path);
                    }
                } else if file_type.is_file()
                    && !filter.is_temp_file(&path)
                    && !filter.is_excluded_subtree(&path)
                {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Every directory under `root` (excluding `root`) accepted by the
    /// filter, parents before children.
    pub async fn collect_dirs(
        root: &Path,
        filter: &ScanFilter,
    ) -> Result<Vec<PathBuf>, ReplicationError> {
        let mut dirs = Vec::new();
        let mut dirs_to_visit = vec![root.to_path_buf()];

        while let Some(current_dir) = dirs_to_visit.pop() {
            let mut entries = tokio::fs::read_dir(&current_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() && !filter.skips_dir(&path) {
                    dirs.push(path.clone());
                    dirs_to_visit.push(path);
                }
            }
        }

        dirs.sort();
        Ok(dirs)
    }

    /// Files directly inside `dir` with the given extension, sorted.
    pub async fn files_with_extension(
        dir: &Path,
        ext: &str,
    ) -> Result<Vec<PathBuf>, ReplicationError> {
        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && Self::has_extension(&path, ext) {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }

    /// Files under `root` whose name matches `file_name`, ignoring case.
    pub async fn find_by_name(
        root: &Path,
        file_name: &str,
        filter: &ScanFilter,
    ) -> Result<Vec<PathBuf>, ReplicationError> {
        let files = Self::collect_files(root, filter).await?;
        Ok(files
            .into_iter()
            .filter(|p| Self::file_name_str(p).eq_ignore_ascii_case(file_name))
            .collect())
    }

    /// Copy a file, creating the destination directory.
    pub async fn copy_file(from: &Path, to: &Path) -> Result<u64, ReplicationError> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(tokio::fs::copy(from, to).await?)
    }

    /// Whether the path exists.
    pub async fn exists(path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(
            FsUtils::normalize_key(Path::new("C:\\Vault\\Module\\A.IPT")),
            "c:/vault/module/a.ipt"
        );
        assert_eq!(FsUtils::normalize_key(Path::new("/src/dir/")), "/src/dir");
        assert_eq!(FsUtils::normalize_key(Path::new("/")), "/");
    }

    #[test]
    fn test_is_under_respects_separator_boundary() {
        let root = Path::new("/src/Module");
        assert!(FsUtils::is_under(Path::new("/src/module/a.ipt"), root));
        assert!(FsUtils::is_under(Path::new("/src/Module"), root));
        assert!(!FsUtils::is_under(Path::new("/src/Module2/a.ipt"), root));
        assert!(!FsUtils::is_under(Path::new("/lib/a.ipt"), root));
    }

    #[test]
    fn test_relative_dir() {
        let root = Path::new("/src/Module");
        assert_eq!(
            FsUtils::relative_dir(Path::new("/src/module/Sub/Deep/a.ipt"), root),
            Some(PathBuf::from("Sub/Deep"))
        );
        assert_eq!(
            FsUtils::relative_dir(Path::new("/src/Module/a.ipt"), root),
            Some(PathBuf::new())
        );
        assert_eq!(FsUtils::relative_dir(Path::new("/other/a.ipt"), root), None);
    }

    #[test]
    fn test_vault_temp_detection() {
        let temp = vec!["v".to_string(), "bak".to_string()];
        assert!(FsUtils::is_vault_temp(Path::new("a.ipt.v"), &temp));
        assert!(FsUtils::is_vault_temp(Path::new("a.BAK"), &temp));
        assert!(FsUtils::is_vault_temp(Path::new("a.ipt.v12"), &temp));
        assert!(!FsUtils::is_vault_temp(Path::new("a.ipt"), &temp));
        assert!(!FsUtils::is_vault_temp(Path::new("a.vtfx"), &temp));
        assert!(!FsUtils::is_vault_temp(Path::new("README"), &temp));
    }

    #[tokio::test]
    async fn test_collect_files_skips_excluded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        std::fs::create_dir_all(root.join("Sub")).expect("mkdir");
        std::fs::create_dir_all(root.join("_V")).expect("mkdir");
        std::fs::create_dir_all(root.join("Catalog")).expect("mkdir");
        std::fs::write(root.join("a.ipt"), "{}").expect("write");
        std::fs::write(root.join("a.ipt.v3"), "{}").expect("write");
        std::fs::write(root.join("Sub/b.ipt"), "{}").expect("write");
        std::fs::write(root.join("_V/c.ipt"), "{}").expect("write");
        std::fs::write(root.join("Catalog/d.ipt"), "{}").expect("write");

        let filter = ScanFilter {
            excluded_folder_names: vec!["_V".into()],
            excluded_subtrees: vec![root.join("Catalog")],
            temp_extensions: vec!["v".into()],
        };
        let files = FsUtils::collect_files(root, &filter).await.expect("scan");
        assert_eq!(files, vec![root.join("Sub/b.ipt"), root.join("a.ipt")]);

        let dirs = FsUtils::collect_dirs(root, &filter).await.expect("scan");
        assert_eq!(dirs, vec![root.join("Sub")]);
    }

    #[tokio::test]
    async fn test_find_by_name_ignores_case() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(temp.path().join("x")).expect("mkdir");
        std::fs::write(temp.path().join("x/Part.IPT"), "{}").expect("write");

        let found = FsUtils::find_by_name(temp.path(), "part.ipt", &ScanFilter::default())
            .await
            .expect("scan");
        assert_eq!(found, vec![temp.path().join("x/Part.IPT")]);
    }
}
