//! Test: Variable Binding - runs are gated by the validator and isolated

use crate::helpers::*;
use fnpipe::core::{RunStatus, Value, ValueType};
use fnpipe::execution::{validate, CancelToken, ExecutionEngine};
use fnpipe::runtime::ScriptInvoker;

const SHIFT: &str = r#"
system_variables:
  - { name: machineId, type: String, value: LINE_01_MACHINE_03 }

variables:
  - { name: price, type: Number, value: 10 }
  - { name: quantity, type: Number, value: 3 }
  - { name: tax, type: Number, value: 1 }
  - { name: label, type: String, value: "ten" }
  - { name: out, type: Number }
  - { name: counter, type: Number, value: 0 }

functions:
  - name: calculateTotal
    arguments:
      - { name: price, type: Number }
      - { name: quantity, type: Number }
      - { name: tax, type: Number }
    returns: Number
    body: (price * quantity) + tax
  - name: bump
    arguments: [{ name: n, type: Number }]
    returns: Number
    body: n + 1.0

pipelines:
  - name: into-system
    steps:
      - function: calculateTotal
        arguments: { price: price, quantity: quantity, tax: tax }
        returns: machineId

  - name: wrong-argument
    steps:
      - function: calculateTotal
        arguments: { price: label, quantity: quantity, tax: tax }
        returns: out

  - name: count
    steps:
      - function: bump
        arguments: { n: counter }
        returns: counter
"#;

/// Writing a Number into a read-only String variable fails on both counts
#[tokio::test]
async fn test_return_into_system_variable_is_rejected() {
    let workspace = Workspace::from_yaml(SHIFT);
    let (report, invoker) = run_with_recorder(&workspace, "into-system").await;

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(validation_kinds(&report), vec!["TypeMismatch", "ReadOnlyTarget"]);
    assert!(report.step_results.is_empty());
    assert!(invoker.calls().is_empty());
    assert_value(&report, "machineId", Value::from("LINE_01_MACHINE_03"));
}

#[tokio::test]
async fn test_argument_type_mismatch_aborts() {
    let workspace = Workspace::from_yaml(SHIFT);
    let (report, _) = run_with_recorder(&workspace, "wrong-argument").await;

    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(validation_kinds(&report), vec!["TypeMismatch"]);
}

/// Each run starts from the saved values, not from the previous run
#[tokio::test]
async fn test_no_carry_over_between_runs() {
    let workspace = Workspace::from_yaml(SHIFT);

    let (first, _) = run_with_recorder(&workspace, "count").await;
    let (second, _) = run_with_recorder(&workspace, "count").await;

    assert_value(&first, "counter", Value::Number(1.0));
    assert_value(&second, "counter", Value::Number(1.0));
    assert_ne!(first.run_id, second.run_id);
}

/// A caller-supplied environment replaces the saved one for a single run
#[tokio::test]
async fn test_run_with_overridden_environment() {
    let workspace = Workspace::from_yaml(SHIFT);
    let pipeline = workspace.pipeline("count");

    let mut env = pipeline.variables.snapshot();
    env.write("counter", Value::Number(41.0)).unwrap();

    let engine = ExecutionEngine::new(ScriptInvoker::new());
    let report = engine
        .execute(pipeline, &workspace.registry, &env, &CancelToken::new())
        .await;

    assert_value(&report, "counter", Value::Number(42.0));
    assert_eq!(env.value("counter"), Some(&Value::Number(41.0)));
}

/// Removing a function invalidates pipelines that call it
#[tokio::test]
async fn test_removed_function_invalidates_pipeline() {
    let mut workspace = Workspace::from_yaml(SHIFT);
    let pipeline = workspace.pipeline("count").clone();
    assert!(validate(&pipeline, &workspace.registry, &pipeline.variables).is_valid());

    workspace.registry.remove("bump").unwrap();
    let result = validate(&pipeline, &workspace.registry, &pipeline.variables);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind(), "UnknownFunction");

    let (report, _) = run_with_recorder(&workspace, "count").await;
    assert_eq!(report.status, RunStatus::Aborted);
}

/// Retyping a variable after saving is caught at run time
#[tokio::test]
async fn test_retyped_variable_is_caught() {
    let mut workspace = Workspace::from_yaml(SHIFT);
    let pipeline = workspace
        .pipelines
        .iter_mut()
        .find(|p| p.name == "count")
        .unwrap();
    pipeline.variables.remove_user("counter").unwrap();
    pipeline
        .variables
        .bind_user("counter", Some(Value::from("zero")), ValueType::String, "")
        .unwrap();

    let (report, _) = run_with_recorder(&workspace, "count").await;
    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(validation_kinds(&report), vec!["TypeMismatch"]);
}
