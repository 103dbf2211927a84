//! Pipeline domain model

use crate::core::{state::RunReport, variable::VariableEnvironment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// One invocation of a registered function, with its variable bindings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Unique step identifier within the pipeline
    pub id: String,

    /// Name of the function this step calls
    pub function_name: String,

    /// Argument name -> variable name
    #[serde(default)]
    pub argument_mappings: BTreeMap<String, String>,

    /// Variable receiving the return value
    #[serde(default)]
    pub return_mapping: Option<String>,
}

impl PipelineStep {
    /// Create a step with no bindings; the id is assigned when it is added to a pipeline
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            function_name: function_name.into(),
            argument_mappings: BTreeMap::new(),
            return_mapping: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Bind a function argument to a variable
    pub fn bind(mut self, argument: impl Into<String>, variable: impl Into<String>) -> Self {
        self.argument_mappings.insert(argument.into(), variable.into());
        self
    }

    /// Store the return value in a variable
    pub fn returning_into(mut self, variable: impl Into<String>) -> Self {
        self.return_mapping = Some(variable.into());
        self
    }

    /// Return target, treating an empty name as no target
    pub fn return_target(&self) -> Option<&str> {
        self.return_mapping.as_deref().filter(|name| !name.is_empty())
    }
}

/// Whether a pipeline is enabled in the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    #[default]
    Active,
    Inactive,
}

/// A saved pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub id: Uuid,

    /// Pipeline name (must not be empty)
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Devices this pipeline targets; opaque to the engine
    #[serde(default)]
    pub device_scope: BTreeSet<String>,

    /// System and user variables, frozen when the pipeline was saved
    #[serde(default)]
    pub variables: VariableEnvironment,

    /// Steps, in execution order
    #[serde(default)]
    pub steps: Vec<PipelineStep>,

    #[serde(default)]
    pub status: PipelineStatus,

    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

impl PipelineDefinition {
    /// Create an empty, active pipeline over the given variable set
    pub fn new(name: impl Into<String>, variables: VariableEnvironment) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            device_scope: BTreeSet::new(),
            variables,
            steps: Vec::new(),
            status: PipelineStatus::Active,
            last_run: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_devices<I, S>(mut self, devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.device_scope.extend(devices.into_iter().map(Into::into));
        self
    }

    /// Append a step, assigning an id when it has none. Returns the step id.
    pub fn add_step(&mut self, mut step: PipelineStep) -> String {
        if step.id.is_empty() {
            step.id = self.next_step_id();
        }
        let id = step.id.clone();
        self.steps.push(step);
        id
    }

    /// Builder form of [`PipelineDefinition::add_step`]
    pub fn with_step(mut self, step: PipelineStep) -> Self {
        self.add_step(step);
        self
    }

    /// Remove a step by id
    pub fn remove_step(&mut self, id: &str) -> Option<PipelineStep> {
        let index = self.steps.iter().position(|s| s.id == id)?;
        Some(self.steps.remove(index))
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Get a mutable step by ID
    pub fn step_mut(&mut self, id: &str) -> Option<&mut PipelineStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    pub fn is_active(&self) -> bool {
        self.status == PipelineStatus::Active
    }

    /// Record the finish time of a run of this pipeline
    pub fn record_run(&mut self, report: &RunReport) {
        if report.pipeline_id == self.id {
            self.last_run = Some(report.finished_at);
        }
    }

    fn next_step_id(&self) -> String {
        let mut n = self.steps.len() + 1;
        loop {
            let candidate = format!("step-{}", n);
            if self.step(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}
