//! Test: Failure Handling - the first runtime fault stops the run

use crate::helpers::*;
use fnpipe::core::{RunStatus, StepStatus, Value};

const STOCK: &str = r#"
variables:
  - { name: qty, type: Number, value: 4 }
  - { name: doubled, type: Number }
  - { name: reserved, type: Number }
  - { name: shipped, type: Number }
  - { name: missing, type: Number }
  - { name: note, type: String }
  - { name: zero, type: Number, value: 0 }
  - { name: ratio, type: Number }

functions:
  - name: double
    arguments: [{ name: n, type: Number }]
    returns: Number
    body: n * 2.0
  - name: reserve
    arguments: [{ name: n, type: Number }]
    returns: Number
    body: |
      if n > 5.0 { throw "out of stock"; }
      n
  - name: ship
    arguments: [{ name: n, type: Number }]
    returns: Number
    body: n
  - name: mislabel
    arguments: [{ name: n, type: Number }]
    returns: Number
    body: '"not a number"'
  - name: silent
    arguments: [{ name: n, type: Number }]
    returns: Number
    body: "let x = n;"
  - name: ratio
    arguments: [{ name: a, type: Number }, { name: b, type: Number }]
    returns: Number
    body: a / b

pipelines:
  - name: fulfil
    steps:
      - { id: double, function: double, arguments: { n: qty }, returns: doubled }
      - { id: reserve, function: reserve, arguments: { n: doubled }, returns: reserved }
      - { id: ship, function: ship, arguments: { n: reserved }, returns: shipped }

  - name: wrong-type
    steps:
      - { function: mislabel, arguments: { n: qty }, returns: doubled }

  - name: no-value
    steps:
      - { function: silent, arguments: { n: qty }, returns: doubled }

  - name: unset-argument
    steps:
      - { function: double, arguments: { n: missing }, returns: doubled }

  - name: divide-by-zero
    steps:
      - { id: ratio, function: ratio, arguments: { a: qty, b: zero }, returns: ratio }
"#;

/// Step 2 throws: step 3 never runs and step 1's write is kept
#[tokio::test]
async fn test_fault_stops_the_run() {
    let workspace = Workspace::from_yaml(STOCK);
    let (report, invoker) = run_with_recorder(&workspace, "fulfil").await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_step_order(&report, &["double", "reserve"]);
    assert_eq!(report.step_results[0].status, StepStatus::Succeeded);
    assert_eq!(report.step_results[1].status, StepStatus::Failed);

    let error = report.step_results[1].error.as_deref().unwrap();
    assert!(error.contains("out of stock"), "error was: {}", error);

    // No rollback of the first step, nothing from the third
    assert_value(&report, "doubled", Value::Number(8.0));
    assert_eq!(report.value("reserved"), None);
    assert_eq!(report.value("shipped"), None);
    assert_eq!(invoker.called_functions(), vec!["double", "reserve"]);

    assert_eq!(report.failed_step().unwrap().step_id, "reserve");
    assert!(report.abort_reason.is_none());
}

#[tokio::test]
async fn test_wrong_return_type_fails_step() {
    let workspace = Workspace::from_yaml(STOCK);
    let (report, _) = run_with_recorder(&workspace, "wrong-type").await;

    assert_eq!(report.status, RunStatus::Failed);
    let error = report.step_results[0].error.as_deref().unwrap();
    assert!(error.contains("expected Number"), "error was: {}", error);
    assert_eq!(report.value("doubled"), None);
}

#[tokio::test]
async fn test_missing_return_value_fails_step() {
    let workspace = Workspace::from_yaml(STOCK);
    let (report, _) = run_with_recorder(&workspace, "no-value").await;

    assert_eq!(report.status, RunStatus::Failed);
    let error = report.step_results[0].error.as_deref().unwrap();
    assert!(error.contains("returned no value"), "error was: {}", error);
}

/// A bound variable without a value fails before the body runs
#[tokio::test]
async fn test_unset_argument_fails_step() {
    let workspace = Workspace::from_yaml(STOCK);
    let (report, invoker) = run_with_recorder(&workspace, "unset-argument").await;

    assert_eq!(report.status, RunStatus::Failed);
    let error = report.step_results[0].error.as_deref().unwrap();
    assert!(error.contains("missing"), "error was: {}", error);
    assert!(invoker.calls().is_empty());
}

/// Infinity and NaN are not Numbers, so the step fails instead of storing them
#[tokio::test]
async fn test_division_by_zero_fails_step() {
    let workspace = Workspace::from_yaml(STOCK);
    let (report, _) = run_with_recorder(&workspace, "divide-by-zero").await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed_step().unwrap().step_id, "ratio");
    let error = report.step_results[0].error.as_deref().unwrap();
    assert!(error.contains("non-finite"), "error was: {}", error);
    assert_eq!(report.value("ratio"), None);
}
