//! Test: Validation Gate - only valid pipelines are saved, runs go to history

use crate::helpers::*;
use fnpipe::core::{PipelineStep, RunStatus};
use fnpipe::persistence::{save_validated_pipeline, InMemoryPersistence, PersistenceBackend};

const WORKSHOP: &str = r#"
include_defaults: true

variables:
  - { name: price, type: Number, value: 10 }
  - { name: quantity, type: Number, value: 3 }
  - { name: out, type: Number }

pipelines:
  - name: totals
    steps:
      - function: calculateTotal
        arguments: { price: price, quantity: quantity, tax: conversionFactor }
        returns: out

  - name: half-bound
    steps:
      - function: calculateTotal
        arguments: { price: price, quantity: quantity }
        returns: out

  - name: empty
"#;

#[tokio::test]
async fn test_only_valid_pipelines_are_saved() {
    let workspace = Workspace::from_yaml(WORKSHOP);
    let store = InMemoryPersistence::new();

    let mut saved = Vec::new();
    for pipeline in &workspace.pipelines {
        let result = save_validated_pipeline(&store, pipeline, &workspace.registry)
            .await
            .unwrap();
        if result.is_valid() {
            saved.push(pipeline.name.clone());
        } else {
            let kinds: Vec<_> = result.errors.iter().map(|e| e.kind()).collect();
            match pipeline.name.as_str() {
                "half-bound" => assert_eq!(kinds, vec!["MissingArgumentBinding"]),
                "empty" => assert_eq!(kinds, vec!["EmptyPipeline"]),
                other => panic!("unexpected invalid pipeline {}", other),
            }
        }
    }

    assert_eq!(saved, vec!["totals"]);
    let stored = store.load_pipelines().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "totals");
}

/// Fixing a rejected pipeline and saving again replaces nothing else
#[tokio::test]
async fn test_fixed_pipeline_can_be_saved() {
    let workspace = Workspace::from_yaml(WORKSHOP);
    let store = InMemoryPersistence::new();

    let mut pipeline = workspace.pipeline("half-bound").clone();
    assert!(!save_validated_pipeline(&store, &pipeline, &workspace.registry)
        .await
        .unwrap()
        .is_valid());

    let step = pipeline.step_mut("step-1").unwrap();
    *step = PipelineStep::new("calculateTotal")
        .with_id("step-1")
        .bind("price", "price")
        .bind("quantity", "quantity")
        .bind("tax", "qualityThreshold")
        .returning_into("out");

    assert!(save_validated_pipeline(&store, &pipeline, &workspace.registry)
        .await
        .unwrap()
        .is_valid());
    assert_eq!(store.load_pipelines().await.unwrap().len(), 1);
}

/// A run report can be stored and found again in history
#[tokio::test]
async fn test_run_is_recorded() {
    let workspace = Workspace::from_yaml(WORKSHOP);
    let store = InMemoryPersistence::new();

    let (report, _) = run_with_recorder(&workspace, "totals").await;
    assert_run_succeeded(&report);
    store.save_run(&report).await.unwrap();

    let mut pipeline = workspace.pipeline("totals").clone();
    pipeline.record_run(&report);
    assert_eq!(pipeline.last_run, Some(report.finished_at));

    let history = store.list_runs(Some("totals"), 5).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RunStatus::Succeeded);
    assert_eq!(history[0].steps_run, 1);

    let loaded = store.load_run(report.run_id).await.unwrap().unwrap();
    assert_eq!(loaded.value("out"), report.value("out"));
}
