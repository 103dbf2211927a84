//! Test: Concurrent Runs - one engine serves separate pipelines from separate tasks

use crate::helpers::*;
use fnpipe::core::{RunStatus, Value};
use fnpipe::execution::{CancelToken, ExecutionEngine};
use fnpipe::runtime::ScriptInvoker;
use std::sync::Arc;

const PLANT: &str = r#"
variables:
  - { name: price, type: Number, value: 10 }
  - { name: quantity, type: Number, value: 3 }
  - { name: result, type: Number }

functions:
  - name: double
    arguments: [{ name: n, type: Number }]
    returns: Number
    body: n * 2.0
  - name: increment
    arguments: [{ name: n, type: Number }]
    returns: Number
    body: n + 1.0

pipelines:
  - name: doubling
    steps:
      - { function: double, arguments: { n: price }, returns: result }
      - { function: double, arguments: { n: result }, returns: result }

  - name: counting
    steps:
      - { function: increment, arguments: { n: quantity }, returns: result }
      - { function: increment, arguments: { n: result }, returns: result }
      - { function: increment, arguments: { n: result }, returns: result }
"#;

/// Both pipelines write `result`; each report only sees its own writes
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pipelines_run_concurrently_in_isolation() {
    let workspace = Workspace::from_yaml(PLANT);
    let engine = Arc::new(ExecutionEngine::new(ScriptInvoker::new()));
    let registry = Arc::new(workspace.registry.clone());

    let mut handles = Vec::new();
    for round in 0..4 {
        for name in ["doubling", "counting"] {
            let engine = Arc::clone(&engine);
            let registry = Arc::clone(&registry);
            let pipeline = workspace.pipeline(name).clone();
            handles.push(tokio::spawn(async move {
                let report = engine
                    .execute_saved(&pipeline, &registry, &CancelToken::new())
                    .await;
                (round, name, report)
            }));
        }
    }

    let mut run_ids = Vec::new();
    for handle in handles {
        let (round, name, report) = handle.await.expect("run task panicked");
        assert_eq!(report.status, RunStatus::Succeeded, "{} in round {}", name, round);
        match name {
            "doubling" => {
                assert_eq!(report.step_results.len(), 2);
                assert_value(&report, "result", Value::Number(40.0));
                assert_value(&report, "quantity", Value::Number(3.0));
            }
            _ => {
                assert_eq!(report.step_results.len(), 3);
                assert_value(&report, "result", Value::Number(6.0));
                assert_value(&report, "price", Value::Number(10.0));
            }
        }
        run_ids.push(report.run_id);
    }

    run_ids.sort();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 8);

    for pipeline in &workspace.pipelines {
        assert_eq!(pipeline.variables.value("result"), None);
    }
}

/// Cancelling one run leaves a concurrent run of the same engine untouched
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_is_scoped_to_one_run() {
    let workspace = Workspace::from_yaml(PLANT);
    let engine = Arc::new(ExecutionEngine::new(ScriptInvoker::new()));

    let cancelled = CancelToken::new();
    cancelled.cancel();

    let first = {
        let engine = Arc::clone(&engine);
        let registry = workspace.registry.clone();
        let pipeline = workspace.pipeline("doubling").clone();
        tokio::spawn(async move { engine.execute_saved(&pipeline, &registry, &cancelled).await })
    };
    let second = {
        let engine = Arc::clone(&engine);
        let registry = workspace.registry.clone();
        let pipeline = workspace.pipeline("counting").clone();
        tokio::spawn(async move {
            engine
                .execute_saved(&pipeline, &registry, &CancelToken::new())
                .await
        })
    };

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert!(first.was_cancelled());
    assert!(first.step_results.is_empty());
    assert_run_succeeded(&second);
    assert_value(&second, "result", Value::Number(6.0));
}
