//! Shared fixtures for replication integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use designcopy_core::config::ReplicationConfig;
use designcopy_core::traits::AuthoringEngine;
use designcopy_engine::{
    EngineSession, ManifestDocument, ManifestEngine, ManifestReference, Orchestrator,
    ReplicationRequest,
};
use tempfile::TempDir;

/// Project identity used by every fixture run.
pub const PROJECT_ID: &str = "123450101";

/// A module template on disk:
///
/// ```text
/// src/
///   Module_.iam        -> sub/A.iam, P.ipt, Catalog/Bolt.ipt, S.ipt (suppressed)
///   P.ipt              -> Catalog/Bolt.ipt
///   S.ipt
///   Orphan.ipt
///   notes.txt
///   notes.bak
///   sub/A.iam          -> sub/C.ipt
///   sub/C.ipt
///   drawings/A.idw     -> sub/A.iam
///   Catalog/Bolt.ipt   (shared library)
///   _V/Old.ipt         (vault archive)
/// ```
pub struct Fixture {
    pub temp: TempDir,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let destination = temp.path().join("dst");

        for dir in ["sub", "drawings", "Catalog", "_V"] {
            std::fs::create_dir_all(source.join(dir)).expect("mkdir");
        }

        let fixture = Self {
            temp,
            source,
            destination,
        };

        for leaf in ["S.ipt", "Orphan.ipt", "sub/C.ipt", "Catalog/Bolt.ipt", "_V/Old.ipt"] {
            fixture.document(leaf, vec![]);
        }
        fixture.document("P.ipt", vec![fixture.live("Catalog/Bolt.ipt")]);
        fixture.document("sub/A.iam", vec![fixture.live("sub/C.ipt")]);
        fixture.document(
            "Module_.iam",
            vec![
                fixture.live("sub/A.iam"),
                fixture.live("P.ipt"),
                fixture.live("Catalog/Bolt.ipt"),
                ManifestReference::suppressed(fixture.src("S.ipt")),
            ],
        );
        fixture.document("drawings/A.idw", vec![fixture.live("sub/A.iam")]);
        std::fs::write(fixture.src("notes.txt"), "module notes").expect("write");
        std::fs::write(fixture.src("notes.bak"), "backup").expect("write");

        fixture
    }

    pub fn src(&self, relative: &str) -> PathBuf {
        self.source.join(relative)
    }

    pub fn dst(&self, relative: &str) -> PathBuf {
        self.destination.join(relative)
    }

    pub fn live(&self, relative: &str) -> ManifestReference {
        ManifestReference::live(self.src(relative))
    }

    pub fn document(&self, relative: &str, references: Vec<ManifestReference>) {
        ManifestDocument::with_references(references)
            .write(&self.src(relative))
            .expect("write document");
    }

    /// Drop a descriptor template outside the source tree.
    pub fn descriptor_template(&self) -> PathBuf {
        let dir = self.temp.path().join("templates");
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("Default.ipj"), "<workspace/>").expect("write");
        dir
    }

    pub fn request(&self) -> ReplicationRequest {
        ReplicationRequest::new(&self.source, &self.destination, PROJECT_ID)
    }

    pub fn config(&self) -> ReplicationConfig {
        ReplicationConfig {
            excluded_subtrees: vec![PathBuf::from("Catalog")],
            ..Default::default()
        }
    }
}

/// Orchestrator over a fresh manifest engine.
pub async fn orchestrator(config: ReplicationConfig) -> Orchestrator {
    let session = EngineSession::spawn(|| {
        Ok(Box::new(ManifestEngine::new()) as Box<dyn AuthoringEngine>)
    })
    .await
    .expect("spawn engine");
    Orchestrator::new(session, config)
}

/// Stored reference targets of a document on disk.
pub fn references_of(path: &Path) -> Vec<PathBuf> {
    ManifestDocument::read(path)
        .expect("read document")
        .references
        .into_iter()
        .map(|r| r.path)
        .collect()
}
