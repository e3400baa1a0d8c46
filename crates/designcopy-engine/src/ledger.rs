//! Accumulated replication state: path and name mappings, the set of
//! processed originals, and per-file records.
//!
//! Owned by the single replication worker; never shared.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::filesystem::FsUtils;
use crate::models::CopyRecord;

/// `original path -> destination path`, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PathMapping {
    entries: HashMap<String, PathBuf>,
}

impl PathMapping {
    /// Record a relocation.
    pub fn insert(&mut self, original: &Path, destination: PathBuf) {
        self.entries
            .insert(FsUtils::normalize_key(original), destination);
    }

    /// Destination of an original path.
    pub fn get(&self, original: &Path) -> Option<&Path> {
        self.entries
            .get(&FsUtils::normalize_key(original))
            .map(PathBuf::as_path)
    }

    /// Number of relocations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was relocated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of a filename lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameLookup<'a> {
    /// Exactly one source file had this name.
    Unique(&'a str),
    /// Several source files share the name.
    Ambiguous(usize),
    /// No file with this name was copied.
    Missing,
}

/// `original file name -> new file name`, case-insensitive. A name shared
/// by files in different folders is ambiguous and never resolved.
#[derive(Debug, Clone, Default)]
pub struct NameMapping {
    entries: HashMap<String, Vec<(String, String)>>,
}

impl NameMapping {
    /// Record the new name of an original file.
    pub fn insert(&mut self, original: &Path, new_file_name: &str) {
        let name = FsUtils::file_name_str(original).to_lowercase();
        let key = FsUtils::normalize_key(original);
        let owners = self.entries.entry(name).or_default();
        if !owners.iter().any(|(path, _)| *path == key) {
            owners.push((key, new_file_name.to_string()));
        }
    }

    /// Look up a file name.
    pub fn lookup(&self, file_name: &str) -> NameLookup<'_> {
        match self.entries.get(&file_name.to_lowercase()).map(Vec::as_slice) {
            Some([(_, new_name)]) => NameLookup::Unique(new_name),
            Some(owners) if owners.len() > 1 => NameLookup::Ambiguous(owners.len()),
            _ => NameLookup::Missing,
        }
    }
}

/// Everything the replication phases accumulate.
#[derive(Debug, Default)]
pub struct CopyLedger {
    /// Exact relocations.
    pub path_mapping: PathMapping,
    /// Name-based fallback.
    pub name_mapping: NameMapping,
    processed: HashSet<String>,
    records: Vec<CopyRecord>,
    files_copied: usize,
    files_failed: usize,
    files_skipped: usize,
}

impl CopyLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the original was already attempted.
    pub fn is_processed(&self, original: &Path) -> bool {
        self.processed.contains(&FsUtils::normalize_key(original))
    }

    /// Store a per-file outcome. Successful copies feed both mappings.
    pub fn record(&mut self, record: CopyRecord) {
        self.processed
            .insert(FsUtils::normalize_key(&record.original_path));
        if record.success {
            self.files_copied += 1;
            self.path_mapping
                .insert(&record.original_path, record.new_path.clone());
            self.name_mapping
                .insert(&record.original_path, &record.new_file_name);
        } else {
            self.files_failed += 1;
        }
        self.records.push(record);
    }

    /// Count a file skipped because its destination already exists. The
    /// existing destination still counts as its relocation.
    pub fn record_skipped(&mut self, original: &Path, destination: PathBuf) {
        self.processed.insert(FsUtils::normalize_key(original));
        self.files_skipped += 1;
        self.name_mapping
            .insert(original, &FsUtils::file_name_str(&destination));
        self.path_mapping.insert(original, destination);
    }

    /// Per-file records in processing order.
    pub fn records(&self) -> &[CopyRecord] {
        &self.records
    }

    /// Mutable access to the records.
    pub fn records_mut(&mut self) -> &mut [CopyRecord] {
        &mut self.records
    }

    /// Consume into the records.
    pub fn into_records(self) -> Vec<CopyRecord> {
        self.records
    }

    /// Files written.
    pub fn files_copied(&self) -> usize {
        self.files_copied
    }

    /// Files that failed.
    pub fn files_failed(&self) -> usize {
        self.files_failed
    }

    /// Files skipped.
    pub fn files_skipped(&self) -> usize {
        self.files_skipped
    }
}
