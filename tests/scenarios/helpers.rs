//! Test utility functions for fnpipe scenarios

use async_trait::async_trait;
use fnpipe::core::config::WorkspaceConfig;
use fnpipe::core::{FunctionDefinition, FunctionRegistry, PipelineDefinition, RunReport, RunStatus, Value};
use fnpipe::execution::{CancelToken, ExecutionEngine};
use fnpipe::runtime::{FunctionInvoker, InvocationFault, ScriptInvoker};
use std::sync::{Arc, Mutex};

/// One recorded invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub function: String,
    pub args: Vec<Value>,
}

/// Invoker that records every call before delegating to Rhai
#[derive(Clone)]
pub struct RecordingInvoker {
    inner: Arc<ScriptInvoker>,
    calls: Arc<Mutex<Vec<Call>>>,
    cancel_after: Option<(usize, CancelToken)>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScriptInvoker::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
            cancel_after: None,
        }
    }

    /// Trigger `token` once `calls` invocations have happened
    pub fn cancelling_after(mut self, calls: usize, token: CancelToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_functions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.function).collect()
    }
}

#[async_trait]
impl FunctionInvoker for RecordingInvoker {
    async fn invoke(
        &self,
        function: &FunctionDefinition,
        args: &[Value],
    ) -> Result<Option<Value>, InvocationFault> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                function: function.name.clone(),
                args: args.to_vec(),
            });
            calls.len()
        };

        let result = self.inner.invoke(function, args).await;

        if let Some((after, token)) = &self.cancel_after {
            if count >= *after {
                token.cancel();
            }
        }

        result
    }
}

/// A loaded workspace: registry plus pipelines
pub struct Workspace {
    pub registry: FunctionRegistry,
    pub pipelines: Vec<PipelineDefinition>,
}

impl Workspace {
    pub fn from_yaml(yaml: &str) -> Self {
        let config = WorkspaceConfig::from_yaml(yaml).expect("workspace should parse");
        Self {
            registry: config.to_registry().expect("registry should build"),
            pipelines: config.to_pipelines().expect("pipelines should build"),
        }
    }

    pub fn pipeline(&self, name: &str) -> &PipelineDefinition {
        self.pipelines
            .iter()
            .find(|p| p.name == name)
            .unwrap_or_else(|| panic!("no pipeline named {}", name))
    }
}

/// Run a saved pipeline with a recording invoker
pub async fn run_with_recorder(
    workspace: &Workspace,
    pipeline_name: &str,
) -> (RunReport, RecordingInvoker) {
    let invoker = RecordingInvoker::new();
    let report = run_with_invoker(workspace, pipeline_name, invoker.clone(), &CancelToken::new()).await;
    (report, invoker)
}

/// Run a saved pipeline with any invoker
pub async fn run_with_invoker<I: FunctionInvoker>(
    workspace: &Workspace,
    pipeline_name: &str,
    invoker: I,
    cancel: &CancelToken,
) -> RunReport {
    let engine = ExecutionEngine::new(invoker);
    engine
        .execute_saved(workspace.pipeline(pipeline_name), &workspace.registry, cancel)
        .await
}

/// Assert the run succeeded, showing step errors otherwise
pub fn assert_run_succeeded(report: &RunReport) {
    assert_eq!(
        report.status,
        RunStatus::Succeeded,
        "run should succeed; steps: {:?}, abort: {:?}",
        report.step_results,
        report.abort_reason
    );
}

/// Assert the order of the step results
pub fn assert_step_order(report: &RunReport, expected: &[&str]) {
    let actual: Vec<&str> = report
        .step_results
        .iter()
        .map(|r| r.step_id.as_str())
        .collect();
    assert_eq!(actual, expected, "step results should be in this order");
}

/// Assert a variable's final value
pub fn assert_value(report: &RunReport, name: &str, expected: Value) {
    assert_eq!(
        report.value(name),
        Some(&expected),
        "final value of {}",
        name
    );
}

/// Kinds of the validation errors that aborted a run
pub fn validation_kinds(report: &RunReport) -> Vec<&'static str> {
    report.validation_errors().iter().map(|e| e.kind()).collect()
}
