//! Function definitions and the registry that catalogs them

use crate::core::types::ValueType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use thiserror::Error;

/// A named, typed parameter of a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionArgument {
    pub name: String,

    #[serde(rename = "type")]
    pub value_type: ValueType,
}

impl FunctionArgument {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// A reusable callable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Unique name within the registry
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Parameters, in call order
    #[serde(default)]
    pub arguments: Vec<FunctionArgument>,

    #[serde(default)]
    pub return_enabled: bool,

    #[serde(default)]
    pub return_type: Option<ValueType>,

    /// Executable source, interpreted by a [`crate::runtime::FunctionInvoker`]
    #[serde(default)]
    pub body: String,
}

impl FunctionDefinition {
    /// Start a definition with no arguments and no return value
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            arguments: Vec::new(),
            return_enabled: false,
            return_type: None,
            body: body.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.arguments.push(FunctionArgument::new(name, value_type));
        self
    }

    pub fn returning(mut self, value_type: ValueType) -> Self {
        self.return_enabled = true;
        self.return_type = Some(value_type);
        self
    }

    /// Find an argument by name
    pub fn argument(&self, name: &str) -> Option<&FunctionArgument> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// The declared return type, when returning is enabled
    pub fn returns(&self) -> Option<ValueType> {
        if self.return_enabled {
            self.return_type
        } else {
            None
        }
    }

    /// Check the signature invariants
    pub fn check_signature(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::MissingName);
        }
        if !is_identifier(&self.name) {
            return Err(self.invalid(format!("'{}' is not a valid identifier", self.name)));
        }

        match (self.return_enabled, self.return_type) {
            (true, None) => return Err(self.invalid("return is enabled but no return type is set")),
            (false, Some(t)) => {
                return Err(self.invalid(format!("return type {} is set but return is disabled", t)))
            }
            _ => {}
        }

        let mut seen = HashSet::new();
        for arg in &self.arguments {
            if !is_identifier(&arg.name) {
                return Err(self.invalid(format!("argument '{}' is not a valid identifier", arg.name)));
            }
            if !seen.insert(arg.name.as_str()) {
                return Err(self.invalid(format!("argument '{}' is declared twice", arg.name)));
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> RegistryError {
        RegistryError::InvalidSignature {
            function: self.name.clone(),
            reason: reason.into(),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
        .is_match(name)
}

/// Errors raised by registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("function '{0}' already exists")]
    DuplicateName(String),

    #[error("function '{0}' not found")]
    NotFound(String),

    #[error("function name is required")]
    MissingName,

    #[error("invalid signature for '{function}': {reason}")]
    InvalidSignature { function: String, reason: String },
}

/// Catalog of function definitions, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<FunctionDefinition>", try_from = "Vec<FunctionDefinition>")]
pub struct FunctionRegistry {
    functions: BTreeMap<String, FunctionDefinition>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new definition
    pub fn register(&mut self, def: FunctionDefinition) -> Result<(), RegistryError> {
        def.check_signature()?;
        if self.functions.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        self.functions.insert(def.name.clone(), def);
        Ok(())
    }

    /// Replace the definition stored under `name`, possibly renaming it
    pub fn update(&mut self, name: &str, def: FunctionDefinition) -> Result<(), RegistryError> {
        if !self.functions.contains_key(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        def.check_signature()?;
        if def.name != name && self.functions.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }

        self.functions.remove(name);
        self.functions.insert(def.name.clone(), def);
        Ok(())
    }

    /// Register `def`, or replace the definition of the same name
    pub fn upsert(&mut self, def: FunctionDefinition) -> Result<(), RegistryError> {
        if self.functions.contains_key(&def.name) {
            let name = def.name.clone();
            self.update(&name, def)
        } else {
            self.register(def)
        }
    }

    /// Remove a definition. Steps referencing it are not touched.
    pub fn remove(&mut self, name: &str) -> Result<FunctionDefinition, RegistryError> {
        self.functions
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn resolve(&self, name: &str) -> Result<&FunctionDefinition, RegistryError> {
        self.functions
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All definitions in name order
    pub fn iter(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl From<FunctionRegistry> for Vec<FunctionDefinition> {
    fn from(registry: FunctionRegistry) -> Self {
        registry.functions.into_values().collect()
    }
}

impl TryFrom<Vec<FunctionDefinition>> for FunctionRegistry {
    type Error = RegistryError;

    fn try_from(defs: Vec<FunctionDefinition>) -> Result<Self, Self::Error> {
        let mut registry = FunctionRegistry::new();
        for def in defs {
            registry.register(def)?;
        }
        Ok(registry)
    }
}
