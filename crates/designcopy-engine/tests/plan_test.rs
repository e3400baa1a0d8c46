//! Dry-run planning.

mod helpers;

use designcopy_core::types::DocumentKind;
use helpers::{Fixture, PROJECT_ID, orchestrator};

#[tokio::test]
async fn test_plan_writes_nothing() {
    let fixture = Fixture::new();
    let orch = orchestrator(fixture.config()).await;

    let plan = orch.plan(&fixture.request()).await.expect("plan");

    assert_eq!(plan.top_assembly, fixture.src("Module_.iam"));
    assert_eq!(plan.graph.len(), 4);

    let last = plan.graph.last().expect("root");
    assert!(last.is_top_assembly);
    assert_eq!(last.new_path, fixture.dst(&format!("{PROJECT_ID}.iam")));

    let first_assembly = plan
        .graph
        .iter()
        .position(|p| p.kind == DocumentKind::Assembly)
        .expect("assembly");
    assert!(plan.graph[..first_assembly].iter().all(|p| p.kind == DocumentKind::Part));

    assert_eq!(plan.external, vec![fixture.src("Catalog/Bolt.ipt")]);
    assert_eq!(plan.drawings.len(), 1);
    assert_eq!(plan.drawings[0].new_path, fixture.dst("drawings/A.idw"));

    assert!(!fixture.destination.exists());
}
