//! End-to-end replication over the manifest engine.

mod helpers;

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use designcopy_core::traits::PropertySet;
use designcopy_engine::{
    CopyPhase, FileRename, ManifestDocument, ManifestReference, ModuleMetadata, ModuleNumber,
    NullProgress, ProjectSource, ReplicationState,
};
use helpers::{Fixture, PROJECT_ID, orchestrator, references_of};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_module_is_replicated_under_new_identity() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.fallback_descriptor_template = Some(fixture.descriptor_template());
    let orch = orchestrator(config).await;

    let mut request = fixture.request();
    request.renames.overrides.push(FileRename {
        original_path: PathBuf::from("C.ipt"),
        new_file_name: "C_v2.ipt".to_string(),
    });

    let result = orch
        .execute(request, &NullProgress, CancellationToken::new())
        .await
        .expect("run");

    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.final_state, ReplicationState::Done);
    assert_eq!(result.files_failed, 0);

    let top = fixture.dst(&format!("{PROJECT_ID}.iam"));
    assert_eq!(result.top_assembly_path.as_deref(), Some(top.as_path()));
    assert!(!fixture.dst("Module_.iam").exists());

    // Renamed part, and the assembly that uses it points at the new name.
    assert!(fixture.dst("sub/C_v2.ipt").exists());
    assert!(!fixture.dst("sub/C.ipt").exists());
    assert_eq!(references_of(&fixture.dst("sub/A.iam")), vec![fixture.dst("sub/C_v2.ipt")]);

    // The shared catalog is referenced in place, never duplicated.
    assert!(!fixture.dst("Catalog").exists());
    assert_eq!(references_of(&fixture.dst("P.ipt")), vec![fixture.src("Catalog/Bolt.ipt")]);
    assert_eq!(
        references_of(&top),
        vec![
            fixture.dst("sub/A.iam"),
            fixture.dst("P.ipt"),
            fixture.src("Catalog/Bolt.ipt"),
            fixture.dst("S.ipt"),
        ]
    );

    // Drawings follow their models.
    assert_eq!(references_of(&fixture.dst("drawings/A.idw")), vec![fixture.dst("sub/A.iam")]);

    // Orphans and plain files come along, archives and temp files do not.
    assert!(fixture.dst("Orphan.ipt").exists());
    assert!(fixture.dst("notes.txt").exists());
    assert!(!fixture.dst("notes.bak").exists());
    assert!(!fixture.dst("_V").exists());

    // No descriptor in the source: the template is cloned under the project id.
    assert!(fixture.dst(&format!("{PROJECT_ID}.ipj")).exists());
    let active = orch
        .session()
        .active_workspace_context()
        .await
        .expect("context");
    assert_eq!(active, Some(fixture.dst(&format!("{PROJECT_ID}.ipj"))));
}

#[tokio::test]
async fn test_drawing_of_orphan_keeps_its_own_model() {
    let fixture = Fixture::new();
    for dir in ["X", "Y"] {
        std::fs::create_dir_all(fixture.src(dir)).expect("mkdir");
    }
    fixture.document("X/Q.ipt", vec![]);
    fixture.document("Y/Q.ipt", vec![]);
    fixture.document(
        "Module_.iam",
        vec![
            fixture.live("sub/A.iam"),
            fixture.live("P.ipt"),
            fixture.live("X/Q.ipt"),
            ManifestReference::suppressed(fixture.src("S.ipt")),
        ],
    );
    fixture.document("drawings/Y.idw", vec![fixture.live("Y/Q.ipt")]);
    let orch = orchestrator(fixture.config()).await;

    let result = orch
        .execute(fixture.request(), &NullProgress, CancellationToken::new())
        .await
        .expect("run");

    assert!(result.success, "{:?}", result.error_message);
    assert!(fixture.dst("X/Q.ipt").exists());
    assert!(fixture.dst("Y/Q.ipt").exists());
    assert_eq!(references_of(&fixture.dst("drawings/Y.idw")), vec![fixture.dst("Y/Q.ipt")]);
}

#[tokio::test]
async fn test_every_file_is_processed_once() {
    let fixture = Fixture::new();
    let orch = orchestrator(fixture.config()).await;

    let result = orch
        .execute(fixture.request(), &NullProgress, CancellationToken::new())
        .await
        .expect("run");

    let mut seen = HashSet::new();
    for record in &result.records {
        assert!(
            seen.insert(record.original_path.clone()),
            "processed twice: {}",
            record.original_path.display()
        );
    }

    let phase_of = |name: &str| {
        result
            .records
            .iter()
            .find(|r| r.original_path == fixture.src(name))
            .map(|r| r.phase)
    };
    assert_eq!(phase_of("P.ipt"), Some(CopyPhase::Graph));
    assert_eq!(phase_of("drawings/A.idw"), Some(CopyPhase::Drawing));
    assert_eq!(phase_of("S.ipt"), Some(CopyPhase::Orphan));
    assert_eq!(phase_of("Orphan.ipt"), Some(CopyPhase::Orphan));
    assert_eq!(phase_of("notes.txt"), Some(CopyPhase::NonCad));
    assert_eq!(phase_of("Catalog/Bolt.ipt"), None);

    let tops: Vec<_> = result.records.iter().filter(|r| r.is_top_assembly).collect();
    assert_eq!(tops.len(), 1);
    assert_eq!(tops[0].new_file_name, format!("{PROJECT_ID}.iam"));
}

#[tokio::test]
async fn test_global_rules_keep_extension_and_top_name() {
    let fixture = Fixture::new();
    let orch = orchestrator(fixture.config()).await;

    let mut request = fixture.request();
    request.renames.prefix = "X_".to_string();
    request.renames.search = Some("Orphan".to_string());
    request.renames.replace = "Spare".to_string();

    let result = orch
        .execute(request, &NullProgress, CancellationToken::new())
        .await
        .expect("run");

    assert!(result.success);
    assert!(fixture.dst("X_P.ipt").exists());
    assert!(fixture.dst("sub/X_A.iam").exists());
    assert!(fixture.dst("X_Spare.ipt").exists());
    assert!(fixture.dst("X_notes.txt").exists());
    assert!(fixture.dst(&format!("{PROJECT_ID}.iam")).exists());

    // The suppressed reference is redirected to the renamed orphan copy.
    let top = references_of(&fixture.dst(&format!("{PROJECT_ID}.iam")));
    assert!(top.contains(&fixture.dst("X_S.ipt")));
}

#[tokio::test]
async fn test_existing_descriptor_is_renamed_and_activated() {
    let fixture = Fixture::new();
    std::fs::write(fixture.src("Module_2024.ipj"), "<workspace/>").expect("write");
    let orch = orchestrator(fixture.config()).await;

    let mut request = fixture.request();
    request.source_kind = ProjectSource::ExistingProject;

    let result = orch
        .execute(request, &NullProgress, CancellationToken::new())
        .await
        .expect("run");

    assert!(result.success);
    let descriptor = fixture.dst(&format!("{PROJECT_ID}.ipj"));
    assert!(descriptor.exists());
    assert!(!fixture.dst("Module_2024.ipj").exists());
    assert_eq!(
        orch.session().active_workspace_context().await.expect("context"),
        Some(descriptor)
    );
}

#[tokio::test]
async fn test_missing_descriptor_without_template_warns() {
    let fixture = Fixture::new();
    let orch = orchestrator(fixture.config()).await;

    let result = orch
        .execute(fixture.request(), &NullProgress, CancellationToken::new())
        .await
        .expect("run");

    assert!(result.success);
    assert!(!fixture.dst(&format!("{PROJECT_ID}.ipj")).exists());
    assert!(result.warnings.iter().any(|w| w.contains("descriptor")));
}

#[tokio::test]
async fn test_metadata_is_stamped_on_new_top_assembly() {
    let fixture = Fixture::new();
    let orch = orchestrator(fixture.config()).await;

    let metadata = ModuleMetadata {
        number: ModuleNumber::new("12345", "01", "01"),
        designer: "JD".to_string(),
        co_designer: "AB".to_string(),
        creation_date: NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"),
        job_title: None,
    };
    let mut request = fixture.request();
    request.metadata = metadata.standard();
    let expected = request.metadata.len();

    let result = orch
        .execute(request, &NullProgress, CancellationToken::new())
        .await
        .expect("run");

    assert_eq!(result.properties_updated, expected);
    let top = ManifestDocument::read(&fixture.dst(&format!("{PROJECT_ID}.iam"))).expect("read");
    assert_eq!(
        top.property(PropertySet::DesignTracking, "Part Number"),
        Some("123450101")
    );
    assert_eq!(top.property(PropertySet::Custom, "Creation_Date"), Some("2026-03-02"));
    assert_eq!(top.property(PropertySet::UserParameter, "Module_Form"), Some("01"));

    let top_record = result
        .records
        .iter()
        .find(|r| r.is_top_assembly)
        .expect("top record");
    assert!(top_record.properties_applied);
    assert_eq!(orch.metrics().snapshot().properties_applied, expected as u64);
}

#[tokio::test]
async fn test_existing_destination_orphan_is_skipped() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(&fixture.destination).expect("mkdir");
    std::fs::write(fixture.dst("Orphan.ipt"), "{}").expect("write");
    let orch = orchestrator(fixture.config()).await;

    let result = orch
        .execute(fixture.request(), &NullProgress, CancellationToken::new())
        .await
        .expect("run");

    assert!(result.success);
    assert_eq!(result.files_skipped, 1);
    assert_eq!(std::fs::read_to_string(fixture.dst("Orphan.ipt")).expect("read"), "{}");
    assert_eq!(orch.metrics().snapshot().orphans_skipped, 1);
}
