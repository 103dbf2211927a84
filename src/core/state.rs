//! Execution state models

use crate::core::{types::Value, validation::ValidationError, variable::VariableEnvironment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Steps are executing
    Running,
    /// Every step succeeded
    Succeeded,
    /// A step raised a runtime fault
    Failed,
    /// Stopped before completion: validation no longer passes, or cancelled
    Aborted,
}

impl RunStatus {
    /// Check if the run is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted)
    }

    /// Legal transitions: Pending -> Running -> terminal
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match (self, next) {
            (RunStatus::Pending, RunStatus::Running) => true,
            (RunStatus::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

/// Why a run was aborted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbortReason {
    /// The pipeline no longer validates against the registry and environment
    Validation(Vec<ValidationError>),
    /// The cancel token was triggered
    Cancelled,
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// Result of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub function_name: String,
    pub status: StepStatus,

    /// Fault detail for failed steps
    #[serde(default)]
    pub error: Option<String>,

    /// Value the function returned, if any
    #[serde(default)]
    pub produced_value: Option<Value>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }
}

/// Immutable record of one finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline_id: Uuid,
    pub pipeline_name: String,
    pub status: RunStatus,

    #[serde(default)]
    pub abort_reason: Option<AbortReason>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Results of the steps that ran, in order
    pub step_results: Vec<StepResult>,

    /// Environment after the last completed step
    pub final_environment: VariableEnvironment,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.abort_reason, Some(AbortReason::Cancelled))
    }

    /// Validation errors that aborted the run, if that is why it stopped
    pub fn validation_errors(&self) -> &[ValidationError] {
        match &self.abort_reason {
            Some(AbortReason::Validation(errors)) => errors,
            _ => &[],
        }
    }

    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_id == step_id)
    }

    pub fn failed_step(&self) -> Option<&StepResult> {
        self.step_results.iter().find(|r| !r.is_success())
    }

    /// Final value of a variable
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.final_environment.value(name)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Mutable bookkeeping for a run in progress
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub total_steps: usize,
    pub step_results: Vec<StepResult>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            started_at: None,
            total_steps: 0,
            step_results: Vec::new(),
        }
    }

    /// Mark the run as started
    pub fn start(&mut self, total_steps: usize) {
        debug_assert!(self.status.can_transition_to(RunStatus::Running));
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_steps = total_steps;
    }

    pub fn record(&mut self, result: StepResult) {
        self.step_results.push(result);
    }

    /// Fraction of steps finished (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.step_results.len() as f64 / self.total_steps as f64
    }

    /// Close the run and produce its report
    pub fn finish(
        self,
        status: RunStatus,
        abort_reason: Option<AbortReason>,
        pipeline_id: Uuid,
        pipeline_name: String,
        final_environment: VariableEnvironment,
    ) -> RunReport {
        debug_assert!(self.status.can_transition_to(status));
        let finished_at = Utc::now();
        RunReport {
            run_id: self.run_id,
            pipeline_id,
            pipeline_name,
            status,
            abort_reason,
            started_at: self.started_at.unwrap_or(finished_at),
            finished_at,
            step_results: self.step_results,
            final_environment,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
