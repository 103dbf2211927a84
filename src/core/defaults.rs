//! Built-in catalogue: seed functions, variables and devices for a fresh workspace

use crate::core::{
    function::{FunctionDefinition, FunctionRegistry, RegistryError},
    types::{Value, ValueType},
    variable::{EnvironmentError, VariableEnvironment},
};

/// Devices a pipeline can be scoped to out of the box
pub const DEFAULT_DEVICES: &[&str] = &[
    "Machine_01",
    "Machine_02",
    "Machine_03",
    "Sensor_A",
    "Sensor_B",
    "Controller_X",
    "Controller_Y",
];

const CALCULATE_TOTAL: &str = r#"fn calculateTotal(price, quantity, tax) {
    (price * quantity) + tax
}"#;

const VALIDATE_EMAIL: &str = r#"fn validateEmail(email) {
    let parts = email.split("@");
    if parts.len() != 2 || email.contains(" ") {
        return "invalid";
    }
    let local = parts[0];
    let domain = parts[1];
    if local.is_empty() || !domain.contains(".") || domain.starts_with(".") || domain.ends_with(".") {
        return "invalid";
    }
    "valid"
}"#;

/// The default function definitions
pub fn default_functions() -> Vec<FunctionDefinition> {
    vec![
        FunctionDefinition::new("calculateTotal", CALCULATE_TOTAL)
            .with_description("Calculate total price with tax")
            .with_argument("price", ValueType::Number)
            .with_argument("quantity", ValueType::Number)
            .with_argument("tax", ValueType::Number)
            .returning(ValueType::Number),
        FunctionDefinition::new("validateEmail", VALIDATE_EMAIL)
            .with_description("Validate email format")
            .with_argument("email", ValueType::String)
            .returning(ValueType::String),
    ]
}

/// A registry holding the default functions
pub fn default_registry() -> Result<FunctionRegistry, RegistryError> {
    let mut registry = FunctionRegistry::new();
    for function in default_functions() {
        registry.register(function)?;
    }
    Ok(registry)
}

/// The default system and user variables
pub fn default_environment() -> Result<VariableEnvironment, EnvironmentError> {
    let mut env = VariableEnvironment::new();

    env.define_system(
        "currentShift",
        Some(Value::from("SHIFT_A")),
        ValueType::String,
        "Current production shift",
    )?;
    env.define_system(
        "machineId",
        Some(Value::from("LINE_01_MACHINE_03")),
        ValueType::String,
        "Current machine identifier",
    )?;
    env.define_system("timestamp", None, ValueType::Number, "Current system timestamp")?;

    env.bind_user(
        "qualityThreshold",
        Some(Value::Number(95.5)),
        ValueType::Number,
        "Minimum quality threshold percentage",
    )?;
    env.bind_user(
        "conversionFactor",
        Some(Value::Number(1.2)),
        ValueType::Number,
        "Unit conversion factor",
    )?;

    Ok(env)
}

pub fn default_devices() -> Vec<String> {
    DEFAULT_DEVICES.iter().map(|d| d.to_string()).collect()
}
