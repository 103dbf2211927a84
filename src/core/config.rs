//! Workspace configuration from YAML

use crate::core::{
    defaults,
    function::{FunctionArgument, FunctionDefinition, FunctionRegistry},
    pipeline::{PipelineDefinition, PipelineStatus, PipelineStep},
    types::{Value, ValueType},
    variable::VariableEnvironment,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use uuid::Uuid;

/// Top-level workspace configuration loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Seed the built-in functions, variables and devices before the ones below
    #[serde(default)]
    pub include_defaults: bool,

    /// Read-only variables supplied by the host
    #[serde(default)]
    pub system_variables: Vec<VariableConfig>,

    /// User variables
    #[serde(default)]
    pub variables: Vec<VariableConfig>,

    #[serde(default)]
    pub functions: Vec<FunctionConfig>,

    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,

    /// Devices pipelines may be scoped to
    #[serde(default)]
    pub devices: Vec<String>,
}

/// Variable declaration as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub value_type: ValueType,

    /// Text parsed per the declared type, or structured YAML; absent for unset
    #[serde(default)]
    pub value: Option<serde_yaml::Value>,

    #[serde(default)]
    pub description: String,
}

/// Function definition as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub arguments: Vec<FunctionArgument>,

    /// Return type; absent when the function returns nothing
    #[serde(default)]
    pub returns: Option<ValueType>,

    /// Rhai source
    pub body: String,
}

/// Pipeline definition as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stable id; generated when absent
    #[serde(default)]
    pub id: Option<Uuid>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub devices: Vec<String>,

    #[serde(default)]
    pub status: PipelineStatus,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step identifier; assigned as `step-<n>` when absent
    #[serde(default)]
    pub id: Option<String>,

    /// Function to call
    pub function: String,

    /// Argument name -> variable name
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,

    /// Variable receiving the return value
    #[serde(default)]
    pub returns: Option<String>,
}

impl WorkspaceConfig {
    /// Load workspace configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workspace file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workspace configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkspaceConfig =
            serde_yaml::from_str(yaml).context("Failed to parse workspace YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workspace configuration.
    ///
    /// This checks the definitions themselves; whether the pipelines bind
    /// correctly is left to the validator.
    pub fn validate(&self) -> Result<()> {
        self.to_environment()?;
        self.to_registry()?;

        let mut seen_names = HashSet::new();
        for pipeline in &self.pipelines {
            if !seen_names.insert(pipeline.name.as_str()) {
                anyhow::bail!("Duplicate pipeline name: {}", pipeline.name);
            }

            let mut seen_ids = HashSet::new();
            for step in &pipeline.steps {
                if let Some(id) = &step.id {
                    if !seen_ids.insert(id.as_str()) {
                        anyhow::bail!(
                            "Pipeline '{}' has duplicate step ID: {}",
                            pipeline.name,
                            id
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Build the variable environment the workspace declares
    pub fn to_environment(&self) -> Result<VariableEnvironment> {
        let mut env = if self.include_defaults {
            defaults::default_environment()?
        } else {
            VariableEnvironment::new()
        };

        for var in &self.system_variables {
            let value = var.resolve_value()?;
            env.define_system(&var.name, value, var.value_type, &var.description)
                .with_context(|| format!("Invalid system variable '{}'", var.name))?;
        }
        for var in &self.variables {
            let value = var.resolve_value()?;
            env.bind_user(&var.name, value, var.value_type, &var.description)
                .with_context(|| format!("Invalid variable '{}'", var.name))?;
        }

        Ok(env)
    }

    /// Build the function registry the workspace declares
    pub fn to_registry(&self) -> Result<FunctionRegistry> {
        let mut registry = if self.include_defaults {
            defaults::default_registry()?
        } else {
            FunctionRegistry::new()
        };

        for function in &self.functions {
            registry
                .register(function.to_definition())
                .with_context(|| format!("Invalid function '{}'", function.name))?;
        }

        Ok(registry)
    }

    /// Build the pipelines, each holding a copy of the workspace environment
    pub fn to_pipelines(&self) -> Result<Vec<PipelineDefinition>> {
        let env = self.to_environment()?;
        Ok(self
            .pipelines
            .iter()
            .map(|p| p.to_pipeline(env.clone()))
            .collect())
    }

    /// Find a pipeline by name
    pub fn pipeline(&self, name: &str) -> Option<&PipelineConfig> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Declared devices, after the defaults when they are included
    pub fn devices(&self) -> Vec<String> {
        let mut devices = if self.include_defaults {
            defaults::default_devices()
        } else {
            Vec::new()
        };
        for device in &self.devices {
            if !devices.contains(device) {
                devices.push(device.clone());
            }
        }
        devices
    }
}

impl VariableConfig {
    /// Interpret the YAML value against the declared type
    pub fn resolve_value(&self) -> Result<Option<Value>> {
        let raw = match &self.value {
            None | Some(serde_yaml::Value::Null) => return Ok(None),
            Some(raw) => raw,
        };

        let value = match raw {
            serde_yaml::Value::String(text) => self
                .value_type
                .parse(text)
                .with_context(|| format!("Invalid value for variable '{}'", self.name))?,
            other => serde_yaml::from_value::<Value>(other.clone())
                .with_context(|| format!("Unsupported value for variable '{}'", self.name))?,
        };

        if value.value_type() != self.value_type {
            anyhow::bail!(
                "Variable '{}' is declared as {} but its value is a {}",
                self.name,
                self.value_type,
                value.value_type()
            );
        }

        if !value.is_finite() {
            anyhow::bail!("Variable '{}' holds a non-finite number", self.name);
        }

        Ok(Some(value))
    }
}

impl FunctionConfig {
    pub fn to_definition(&self) -> FunctionDefinition {
        let mut def = FunctionDefinition::new(&self.name, &self.body)
            .with_description(&self.description);
        def.arguments = self.arguments.clone();
        if let Some(return_type) = self.returns {
            def = def.returning(return_type);
        }
        def
    }
}

impl PipelineConfig {
    /// Convert config to a pipeline over the given variable set
    pub fn to_pipeline(&self, variables: VariableEnvironment) -> PipelineDefinition {
        let mut pipeline = PipelineDefinition::new(&self.name, variables)
            .with_description(&self.description)
            .with_devices(self.devices.iter().cloned());
        if let Some(id) = self.id {
            pipeline.id = id;
        }
        pipeline.status = self.status;

        for step in &self.steps {
            pipeline.add_step(PipelineStep {
                id: step.id.clone().unwrap_or_default(),
                function_name: step.function.clone(),
                argument_mappings: step.arguments.clone(),
                return_mapping: step.returns.clone(),
            });
        }

        pipeline
    }
}
