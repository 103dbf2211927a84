//! Variable environment - typed name/value store split into system and user tiers

use crate::core::types::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Which tier a variable lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Read-only, supplied by the host
    System,
    /// Created and removed by the user
    User,
}

/// A named, typed slot in the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,

    /// Current value; `None` for a declared but unset slot
    #[serde(default)]
    pub value: Option<Value>,

    #[serde(rename = "type")]
    pub value_type: ValueType,

    #[serde(default)]
    pub description: String,

    pub origin: Origin,
}

impl Variable {
    pub fn is_system(&self) -> bool {
        self.origin == Origin::System
    }
}

/// Errors raised by environment operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvironmentError {
    #[error("variable '{0}' not found")]
    NotFound(String),

    #[error("variable '{0}' already exists")]
    DuplicateName(String),

    #[error("system variable '{0}' cannot be removed")]
    Forbidden(String),

    #[error("system variable '{0}' is read-only")]
    ReadOnly(String),

    #[error("variable '{name}' is declared as {expected} but was given a {actual}")]
    ValueTypeMismatch {
        name: String,
        expected: ValueType,
        actual: ValueType,
    },
}

/// The two-tier variable store.
///
/// Names are unique across both tiers, so a single map keyed by name holds
/// everything and the origin tag decides which mutations are allowed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Variable>", try_from = "Vec<Variable>")]
pub struct VariableEnvironment {
    variables: BTreeMap<String, Variable>,
}

impl VariableEnvironment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a variable up by name
    pub fn lookup(&self, name: &str) -> Result<&Variable, EnvironmentError> {
        self.variables
            .get(name)
            .ok_or_else(|| EnvironmentError::NotFound(name.to_string()))
    }

    /// Get a variable's value, if the variable exists and is set
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.variables.get(name).and_then(|v| v.value.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Add a user variable
    pub fn bind_user(
        &mut self,
        name: impl Into<String>,
        value: Option<Value>,
        value_type: ValueType,
        description: impl Into<String>,
    ) -> Result<(), EnvironmentError> {
        self.insert(name.into(), value, value_type, description.into(), Origin::User)
    }

    /// Seed a read-only system variable
    pub fn define_system(
        &mut self,
        name: impl Into<String>,
        value: Option<Value>,
        value_type: ValueType,
        description: impl Into<String>,
    ) -> Result<(), EnvironmentError> {
        self.insert(name.into(), value, value_type, description.into(), Origin::System)
    }

    fn insert(
        &mut self,
        name: String,
        value: Option<Value>,
        value_type: ValueType,
        description: String,
        origin: Origin,
    ) -> Result<(), EnvironmentError> {
        if self.variables.contains_key(&name) {
            return Err(EnvironmentError::DuplicateName(name));
        }
        check_type(&name, value_type, value.as_ref())?;

        self.variables.insert(
            name.clone(),
            Variable {
                name,
                value,
                value_type,
                description,
                origin,
            },
        );
        Ok(())
    }

    /// Remove a user variable
    pub fn remove_user(&mut self, name: &str) -> Result<Variable, EnvironmentError> {
        match self.variables.get(name) {
            None => Err(EnvironmentError::NotFound(name.to_string())),
            Some(var) if var.is_system() => Err(EnvironmentError::Forbidden(name.to_string())),
            Some(_) => self
                .variables
                .remove(name)
                .ok_or_else(|| EnvironmentError::NotFound(name.to_string())),
        }
    }

    /// Independent copy used to seed a run
    pub fn snapshot(&self) -> VariableEnvironment {
        self.clone()
    }

    /// Store a step's return value into a user variable
    pub fn write(&mut self, name: &str, value: Value) -> Result<(), EnvironmentError> {
        let var = self
            .variables
            .get_mut(name)
            .ok_or_else(|| EnvironmentError::NotFound(name.to_string()))?;

        if var.is_system() {
            return Err(EnvironmentError::ReadOnly(name.to_string()));
        }
        check_type(name, var.value_type, Some(&value))?;

        var.value = Some(value);
        Ok(())
    }

    /// Replace a system variable's value. Only the executor does this.
    pub(crate) fn refresh_system(&mut self, name: &str, value: Value) -> Result<(), EnvironmentError> {
        let var = self
            .variables
            .get_mut(name)
            .ok_or_else(|| EnvironmentError::NotFound(name.to_string()))?;
        check_type(name, var.value_type, Some(&value))?;
        var.value = Some(value);
        Ok(())
    }

    /// All variables in name order
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn system(&self) -> impl Iterator<Item = &Variable> {
        self.iter().filter(|v| v.origin == Origin::System)
    }

    pub fn user(&self) -> impl Iterator<Item = &Variable> {
        self.iter().filter(|v| v.origin == Origin::User)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl From<VariableEnvironment> for Vec<Variable> {
    fn from(env: VariableEnvironment) -> Self {
        env.variables.into_values().collect()
    }
}

impl TryFrom<Vec<Variable>> for VariableEnvironment {
    type Error = EnvironmentError;

    fn try_from(variables: Vec<Variable>) -> Result<Self, Self::Error> {
        let mut env = VariableEnvironment::new();
        for var in variables {
            env.insert(var.name, var.value, var.value_type, var.description, var.origin)?;
        }
        Ok(env)
    }
}

fn check_type(name: &str, expected: ValueType, value: Option<&Value>) -> Result<(), EnvironmentError> {
    match value {
        Some(v) if v.value_type() != expected => Err(EnvironmentError::ValueTypeMismatch {
            name: name.to_string(),
            expected,
            actual: v.value_type(),
        }),
        _ => Ok(()),
    }
}
