//! File-backed authoring engine.
//!
//! Documents are JSON manifests holding properties and reference
//! descriptors; the document kind comes from the file extension. The
//! engine reproduces the reference behaviour replication depends on:
//!
//! - `all_referenced_documents` follows only live (non-suppressed)
//!   references;
//! - `save_as` relinks live references of every *other open* document from
//!   the old path to the new one, in memory;
//! - suppressed descriptors and documents that are not open are never
//!   relinked.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use designcopy_core::error::AppError;
use designcopy_core::result::AppResult;
use designcopy_core::traits::{AuthoringEngine, FileReference, PropertySet};
use designcopy_core::types::{DocumentHandle, DocumentKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filesystem::FsUtils;

/// A stored reference descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestReference {
    /// Referenced file.
    pub path: PathBuf,
    /// Suppressed components stay in the file but are not loaded.
    #[serde(default)]
    pub suppressed: bool,
}

impl ManifestReference {
    /// Live reference.
    pub fn live(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            suppressed: false,
        }
    }

    /// Suppressed reference.
    pub fn suppressed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            suppressed: true,
        }
    }
}

/// On-disk document content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    /// Property sets keyed by set name, then property name.
    #[serde(default)]
    pub properties: BTreeMap<String, BTreeMap<String, String>>,
    /// Reference descriptors in stored order.
    #[serde(default)]
    pub references: Vec<ManifestReference>,
}

impl ManifestDocument {
    /// Document with the given references.
    pub fn with_references(references: Vec<ManifestReference>) -> Self {
        Self {
            references,
            ..Default::default()
        }
    }

    /// Read a document from disk.
    pub fn read(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the document to disk.
    pub fn write(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Property value, if set.
    pub fn property(&self, set: PropertySet, name: &str) -> Option<&str> {
        self.properties
            .get(&set.to_string())
            .and_then(|props| props.get(name))
            .map(String::as_str)
    }
}

#[derive(Debug)]
struct OpenDocument {
    path: PathBuf,
    kind: DocumentKind,
    content: ManifestDocument,
}

/// Authoring engine over JSON manifest files.
#[derive(Debug, Default)]
pub struct ManifestEngine {
    next_handle: u64,
    documents: HashMap<DocumentHandle, OpenDocument>,
    by_path: HashMap<String, DocumentHandle>,
    context: Option<PathBuf>,
}

impl ManifestEngine {
    /// Create an engine with no open documents and no active context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open documents.
    pub fn open_count(&self) -> usize {
        self.documents.len()
    }

    fn document(&self, handle: DocumentHandle) -> AppResult<&OpenDocument> {
        self.documents
            .get(&handle)
            .ok_or_else(|| AppError::not_found(format!("Document {handle} is not open")))
    }

    fn document_mut(&mut self, handle: DocumentHandle) -> AppResult<&mut OpenDocument> {
        self.documents
            .get_mut(&handle)
            .ok_or_else(|| AppError::not_found(format!("Document {handle} is not open")))
    }
}

impl AuthoringEngine for ManifestEngine {
    fn name(&self) -> &str {
        "manifest"
    }

    fn open(&mut self, path: &Path, _visible: bool) -> AppResult<DocumentHandle> {
        let key = FsUtils::normalize_key(path);
        if let Some(handle) = self.by_path.get(&key) {
            return Ok(*handle);
        }

        let kind = DocumentKind::from_path(path).ok_or_else(|| {
            AppError::validation(format!("Not an engine document: {}", path.display()))
        })?;
        let content = ManifestDocument::read(path)
            .map_err(|e| AppError::engine(format!("Cannot open {}: {}", path.display(), e.message)))?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.documents.insert(
            handle,
            OpenDocument {
                path: path.to_path_buf(),
                kind,
                content,
            },
        );
        self.by_path.insert(key, handle);
        debug!(%handle, path = %path.display(), "Opened document");
        Ok(handle)
    }

    fn all_referenced_documents(
        &mut self,
        handle: DocumentHandle,
    ) -> AppResult<Vec<DocumentHandle>> {
        let mut visited = HashSet::from([handle]);
        let mut queue = VecDeque::from([handle]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            let targets: Vec<PathBuf> = self
                .document(current)?
                .content
                .references
                .iter()
                .filter(|r| !r.suppressed)
                .map(|r| r.path.clone())
                .collect();

            for target in targets {
                if !target.is_file() {
                    debug!(path = %target.display(), "Referenced file missing, skipping");
                    continue;
                }
                let child = self.open(&target, false)?;
                if visited.insert(child) {
                    found.push(child);
                    queue.push_back(child);
                }
            }
        }

        Ok(found)
    }

    fn full_path(&self, handle: DocumentHandle) -> AppResult<PathBuf> {
        Ok(self.document(handle)?.path.clone())
    }

    fn kind(&self, handle: DocumentHandle) -> AppResult<DocumentKind> {
        Ok(self.document(handle)?.kind)
    }

    fn save_as(&mut self, handle: DocumentHandle, new_path: &Path) -> AppResult<()> {
        let old_path = {
            let doc = self.document(handle)?;
            doc.content.write(new_path)?;
            doc.path.clone()
        };

        self.by_path.remove(&FsUtils::normalize_key(&old_path));
        self.by_path.insert(FsUtils::normalize_key(new_path), handle);
        self.document_mut(handle)?.path = new_path.to_path_buf();

        for (other, doc) in self.documents.iter_mut() {
            if *other == handle {
                continue;
            }
            for reference in doc
                .content
                .references
                .iter_mut()
                .filter(|r| !r.suppressed && FsUtils::same_path(&r.path, &old_path))
            {
                reference.path = new_path.to_path_buf();
            }
        }

        debug!(%handle, from = %old_path.display(), to = %new_path.display(), "Saved document as");
        Ok(())
    }

    fn file_references(&self, handle: DocumentHandle) -> AppResult<Vec<FileReference>> {
        Ok(self
            .document(handle)?
            .content
            .references
            .iter()
            .enumerate()
            .map(|(index, r)| FileReference {
                index,
                path: r.path.clone(),
            })
            .collect())
    }

    fn redirect_file_reference(
        &mut self,
        handle: DocumentHandle,
        reference: &FileReference,
        new_path: &Path,
    ) -> AppResult<()> {
        let doc = self.document_mut(handle)?;
        match doc.content.references.get_mut(reference.index) {
            Some(stored) => {
                stored.path = new_path.to_path_buf();
                Ok(())
            }
            None => Err(AppError::not_found(format!(
                "Reference #{} not found in {}",
                reference.index,
                doc.path.display()
            ))),
        }
    }

    fn set_property(
        &mut self,
        handle: DocumentHandle,
        set: PropertySet,
        name: &str,
        value: &str,
    ) -> AppResult<()> {
        if name.is_empty() {
            return Err(AppError::validation("Property name must not be empty"));
        }
        self.document_mut(handle)?
            .content
            .properties
            .entry(set.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn update(&mut self, handle: DocumentHandle) -> AppResult<()> {
        self.document(handle).map(|_| ())
    }

    fn save(&mut self, handle: DocumentHandle) -> AppResult<()> {
        let doc = self.document(handle)?;
        doc.content.write(&doc.path)
    }

    fn close(&mut self, handle: DocumentHandle, save: bool) -> AppResult<()> {
        if save {
            self.save(handle)?;
        }
        if let Some(doc) = self.documents.remove(&handle) {
            self.by_path.remove(&FsUtils::normalize_key(&doc.path));
        }
        Ok(())
    }

    fn close_all(&mut self) -> AppResult<()> {
        self.documents.clear();
        self.by_path.clear();
        Ok(())
    }

    fn switch_workspace_context(&mut self, descriptor: &Path) -> AppResult<()> {
        if !self.documents.is_empty() {
            return Err(AppError::conflict(format!(
                "Cannot switch workspace with {} open document(s)",
                self.documents.len()
            )));
        }
        if !descriptor.is_file() {
            return Err(AppError::not_found(format!(
                "Workspace descriptor not found: {}",
                descriptor.display()
            )));
        }
        self.context = Some(descriptor.to_path_buf());
        Ok(())
    }

    fn active_workspace_context(&self) -> AppResult<Option<PathBuf>> {
        Ok(self.context.clone())
    }
}
