//! Validation outcomes shared by the validator, run reports and storage

use crate::core::types::ValueType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which slot of a step a type mismatch concerns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    Argument(String),
    Return,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Argument(name) => write!(f, "argument '{}'", name),
            Slot::Return => f.write_str("return value"),
        }
    }
}

/// A problem that blocks saving or running a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("pipeline name is required")]
    MissingName,

    #[error("pipeline has no steps")]
    EmptyPipeline,

    #[error("step id '{step_id}' is used more than once")]
    DuplicateStepId { step_id: String },

    #[error("step '{step_id}': unknown function '{function}'")]
    UnknownFunction { step_id: String, function: String },

    #[error("step '{step_id}': argument '{argument}' of '{function}' is not bound")]
    MissingArgumentBinding {
        step_id: String,
        function: String,
        argument: String,
    },

    #[error("step '{step_id}': '{function}' has no argument '{argument}'")]
    UnknownArgument {
        step_id: String,
        function: String,
        argument: String,
    },

    #[error("step '{step_id}': unknown variable '{variable}'")]
    UnknownVariable { step_id: String, variable: String },

    #[error("step '{step_id}': {slot} expects {expected} but variable '{variable}' is {actual}")]
    TypeMismatch {
        step_id: String,
        slot: Slot,
        variable: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("step '{step_id}': '{function}' does not return a value")]
    ReturnNotSupported { step_id: String, function: String },

    #[error("step '{step_id}': system variable '{variable}' cannot receive a return value")]
    ReadOnlyTarget { step_id: String, variable: String },
}

impl ValidationError {
    /// The step this error belongs to, if any
    pub fn step_id(&self) -> Option<&str> {
        match self {
            ValidationError::MissingName | ValidationError::EmptyPipeline => None,
            ValidationError::DuplicateStepId { step_id }
            | ValidationError::UnknownFunction { step_id, .. }
            | ValidationError::MissingArgumentBinding { step_id, .. }
            | ValidationError::UnknownArgument { step_id, .. }
            | ValidationError::UnknownVariable { step_id, .. }
            | ValidationError::TypeMismatch { step_id, .. }
            | ValidationError::ReturnNotSupported { step_id, .. }
            | ValidationError::ReadOnlyTarget { step_id, .. } => Some(step_id),
        }
    }

    /// Short kind name, used in terminal output
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingName => "MissingName",
            ValidationError::EmptyPipeline => "EmptyPipeline",
            ValidationError::DuplicateStepId { .. } => "DuplicateStepId",
            ValidationError::UnknownFunction { .. } => "UnknownFunction",
            ValidationError::MissingArgumentBinding { .. } => "MissingArgumentBinding",
            ValidationError::UnknownArgument { .. } => "UnknownArgument",
            ValidationError::UnknownVariable { .. } => "UnknownVariable",
            ValidationError::TypeMismatch { .. } => "TypeMismatch",
            ValidationError::ReturnNotSupported { .. } => "ReturnNotSupported",
            ValidationError::ReadOnlyTarget { .. } => "ReadOnlyTarget",
        }
    }
}

/// Every problem found in one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors reported against one step
    pub fn for_step<'a>(&'a self, step_id: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors.iter().filter(move |e| e.step_id() == Some(step_id))
    }

    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}
