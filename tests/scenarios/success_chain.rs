//! Test: Success Chain - steps run in order and feed each other

use crate::helpers::*;
use fnpipe::core::Value;

const CHECKOUT: &str = r#"
variables:
  - { name: price, type: Number, value: 10 }
  - { name: quantity, type: Number, value: 3 }
  - { name: tax, type: Number, value: 1 }
  - { name: factor, type: Number, value: "1.5" }
  - { name: out, type: Number }
  - { name: scaled, type: Number }
  - { name: label, type: String }

functions:
  - name: calculateTotal
    arguments:
      - { name: price, type: Number }
      - { name: quantity, type: Number }
      - { name: tax, type: Number }
    returns: Number
    body: |
      fn calculateTotal(price, quantity, tax) {
          (price * quantity) + tax
      }
  - name: scale
    arguments:
      - { name: value, type: Number }
      - { name: factor, type: Number }
    returns: Number
    body: value * factor
  - name: describe
    arguments:
      - { name: amount, type: Number }
    returns: String
    body: '"total: " + amount'

pipelines:
  - name: total
    steps:
      - function: calculateTotal
        arguments: { price: price, quantity: quantity, tax: tax }
        returns: out

  - name: chain
    steps:
      - id: total
        function: calculateTotal
        arguments: { price: price, quantity: quantity, tax: tax }
        returns: out
      - id: scale
        function: scale
        arguments: { value: out, factor: factor }
        returns: scaled
      - id: describe
        function: describe
        arguments: { amount: scaled }
        returns: label
"#;

/// The basic calculateTotal run: out = 10 * 3 + 1
#[tokio::test]
async fn test_calculate_total() {
    let workspace = Workspace::from_yaml(CHECKOUT);
    let (report, invoker) = run_with_recorder(&workspace, "total").await;

    assert_run_succeeded(&report);
    assert_step_order(&report, &["step-1"]);
    assert_value(&report, "out", Value::Number(31.0));
    assert_eq!(
        report.step_results[0].produced_value,
        Some(Value::Number(31.0))
    );

    // Arguments arrive in declaration order
    assert_eq!(
        invoker.calls()[0].args,
        vec![Value::Number(10.0), Value::Number(3.0), Value::Number(1.0)]
    );

    // The saved variable set is untouched
    assert_eq!(workspace.pipeline("total").variables.value("out"), None);
}

/// Each step sees the values written by the steps before it
#[tokio::test]
async fn test_chain_passes_values_forward() {
    let workspace = Workspace::from_yaml(CHECKOUT);
    let (report, invoker) = run_with_recorder(&workspace, "chain").await;

    assert_run_succeeded(&report);
    assert_step_order(&report, &["total", "scale", "describe"]);
    assert_eq!(
        invoker.called_functions(),
        vec!["calculateTotal", "scale", "describe"]
    );

    assert_value(&report, "out", Value::Number(31.0));
    assert_value(&report, "scaled", Value::Number(46.5));
    assert_value(&report, "label", Value::from("total: 46.5"));
    assert!(report.step_results.iter().all(|r| r.is_success()));
}

/// The default catalogue runs without any extra definitions
#[tokio::test]
async fn test_default_functions() {
    let yaml = r#"
include_defaults: true
variables:
  - { name: email, type: String, value: "operator@plant.example" }
  - { name: verdict, type: String }
pipelines:
  - name: check
    devices: [Sensor_A]
    steps:
      - function: validateEmail
        arguments: { email: email }
        returns: verdict
"#;
    let workspace = Workspace::from_yaml(yaml);
    let (report, _) = run_with_recorder(&workspace, "check").await;

    assert_run_succeeded(&report);
    assert_value(&report, "verdict", Value::from("valid"));
    // System variables come along, with the timestamp refreshed
    assert_value(&report, "machineId", Value::from("LINE_01_MACHINE_03"));
    assert!(report.value("timestamp").is_some());
}

/// A function with no return setting can still run as a step
#[tokio::test]
async fn test_step_without_return_mapping() {
    let yaml = r#"
variables:
  - { name: reading, type: Number, value: 7 }
functions:
  - name: observe
    arguments:
      - { name: reading, type: Number }
    body: "let seen = reading;"
pipelines:
  - name: watch
    steps:
      - function: observe
        arguments: { reading: reading }
"#;
    let workspace = Workspace::from_yaml(yaml);
    let (report, invoker) = run_with_recorder(&workspace, "watch").await;

    assert_run_succeeded(&report);
    assert_eq!(report.step_results[0].produced_value, None);
    assert_eq!(invoker.calls().len(), 1);
}
