//! Binder/validator - proves a pipeline's bindings are complete and type-safe

use crate::core::{
    function::{FunctionDefinition, FunctionRegistry},
    pipeline::{PipelineDefinition, PipelineStep},
    types::{compatible, ValueType},
    variable::{Variable, VariableEnvironment},
};
use std::collections::HashSet;

pub use crate::core::validation::{Slot, ValidationError, ValidationResult};

/// Check a pipeline against a registry and environment.
///
/// Pipeline-level problems come first, then each step's problems in
/// definition order. A step stops at its first failing check, except that a
/// return target is checked for both type and writability.
pub fn validate(
    pipeline: &PipelineDefinition,
    registry: &FunctionRegistry,
    environment: &VariableEnvironment,
) -> ValidationResult {
    let mut errors = Vec::new();

    if pipeline.name.trim().is_empty() {
        errors.push(ValidationError::MissingName);
    }

    if pipeline.steps.is_empty() {
        errors.push(ValidationError::EmptyPipeline);
        return ValidationResult { errors };
    }

    let mut seen = HashSet::new();
    for step in &pipeline.steps {
        if !seen.insert(step.id.as_str()) {
            errors.push(ValidationError::DuplicateStepId {
                step_id: step.id.clone(),
            });
        }
    }

    for step in &pipeline.steps {
        errors.extend(check_step(step, registry, environment));
    }

    ValidationResult { errors }
}

fn check_step(
    step: &PipelineStep,
    registry: &FunctionRegistry,
    environment: &VariableEnvironment,
) -> Vec<ValidationError> {
    let step_id = || step.id.clone();

    let function = match registry.resolve(&step.function_name) {
        Ok(function) => function,
        Err(_) => {
            return vec![ValidationError::UnknownFunction {
                step_id: step_id(),
                function: step.function_name.clone(),
            }]
        }
    };

    if let Some(arg) = function
        .arguments
        .iter()
        .find(|arg| !step.argument_mappings.contains_key(&arg.name))
    {
        return vec![ValidationError::MissingArgumentBinding {
            step_id: step_id(),
            function: function.name.clone(),
            argument: arg.name.clone(),
        }];
    }

    if let Some(extra) = step
        .argument_mappings
        .keys()
        .find(|name| function.argument(name).is_none())
    {
        return vec![ValidationError::UnknownArgument {
            step_id: step_id(),
            function: function.name.clone(),
            argument: extra.clone(),
        }];
    }

    let bound = match resolve_arguments(step, function, environment) {
        Ok(bound) => bound,
        Err(error) => return vec![error],
    };

    for (arg_name, arg_type, variable) in bound {
        if !compatible(arg_type, variable.value_type) {
            return vec![ValidationError::TypeMismatch {
                step_id: step_id(),
                slot: Slot::Argument(arg_name.to_string()),
                variable: variable.name.clone(),
                expected: arg_type,
                actual: variable.value_type,
            }];
        }
    }

    let Some(target) = step.return_target() else {
        return Vec::new();
    };

    let Some(return_type) = function.returns() else {
        return vec![ValidationError::ReturnNotSupported {
            step_id: step_id(),
            function: function.name.clone(),
        }];
    };

    let variable = match environment.lookup(target) {
        Ok(variable) => variable,
        Err(_) => {
            return vec![ValidationError::UnknownVariable {
                step_id: step_id(),
                variable: target.to_string(),
            }]
        }
    };

    let mut errors = Vec::new();
    if !compatible(return_type, variable.value_type) {
        errors.push(ValidationError::TypeMismatch {
            step_id: step_id(),
            slot: Slot::Return,
            variable: variable.name.clone(),
            expected: return_type,
            actual: variable.value_type,
        });
    }
    if variable.is_system() {
        errors.push(ValidationError::ReadOnlyTarget {
            step_id: step_id(),
            variable: variable.name.clone(),
        });
    }
    errors
}

/// Resolve every argument's variable, in the function's argument order
fn resolve_arguments<'a>(
    step: &PipelineStep,
    function: &'a FunctionDefinition,
    environment: &'a VariableEnvironment,
) -> Result<Vec<(&'a str, ValueType, &'a Variable)>, ValidationError> {
    let mut bound = Vec::with_capacity(function.arguments.len());
    for arg in &function.arguments {
        let Some(var_name) = step.argument_mappings.get(&arg.name) else {
            continue;
        };
        let variable = environment
            .lookup(var_name)
            .map_err(|_| ValidationError::UnknownVariable {
                step_id: step.id.clone(),
                variable: var_name.clone(),
            })?;
        bound.push((arg.name.as_str(), arg.value_type, variable));
    }
    Ok(bound)
}
