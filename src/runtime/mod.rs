//! Function runtime - invokes a function body with bound argument values

pub mod script;

use crate::core::{
    function::FunctionDefinition,
    types::{Value, ValueType},
    variable::EnvironmentError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub use script::ScriptInvoker;

/// A runtime fault raised while running one step
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvocationFault {
    #[error("function '{function}' raised: {message}")]
    Raised { function: String, message: String },

    #[error("no implementation available for function '{0}'")]
    Unavailable(String),

    #[error("argument '{argument}' is not bound to a variable")]
    Unbound { argument: String },

    #[error("argument '{argument}' is bound to '{variable}', which has no value")]
    UnsetArgument { argument: String, variable: String },

    #[error("function '{0}' returned no value")]
    MissingReturnValue(String),

    #[error("function '{function}' returned a {actual}, expected {expected}")]
    WrongReturnType {
        function: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("function '{function}' returned an unsupported value: {detail}")]
    UnsupportedValue { function: String, detail: String },

    #[error("could not store return value: {0}")]
    WriteRejected(#[from] EnvironmentError),
}

/// Trait for body invocation - allows for different implementations
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Run `function`'s body with arguments in declaration order.
    ///
    /// Returns `None` when the body produced no value.
    async fn invoke(
        &self,
        function: &FunctionDefinition,
        args: &[Value],
    ) -> Result<Option<Value>, InvocationFault>;
}

#[async_trait]
impl<T: FunctionInvoker + ?Sized> FunctionInvoker for Arc<T> {
    async fn invoke(
        &self,
        function: &FunctionDefinition,
        args: &[Value],
    ) -> Result<Option<Value>, InvocationFault> {
        (**self).invoke(function, args).await
    }
}

/// Native Rust implementation of a function
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Option<Value>, String> + Send + Sync>;

/// Invoker backed by Rust closures registered per function name.
///
/// The definition's body text is ignored.
#[derive(Clone, Default)]
pub struct NativeInvoker {
    functions: HashMap<String, NativeFn>,
}

impl NativeInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the implementation of `name`
    pub fn register<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Option<Value>, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl std::fmt::Debug for NativeInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("NativeInvoker").field("functions", &names).finish()
    }
}

#[async_trait]
impl FunctionInvoker for NativeInvoker {
    async fn invoke(
        &self,
        function: &FunctionDefinition,
        args: &[Value],
    ) -> Result<Option<Value>, InvocationFault> {
        let f = self
            .functions
            .get(&function.name)
            .ok_or_else(|| InvocationFault::Unavailable(function.name.clone()))?;

        f(args).map_err(|message| InvocationFault::Raised {
            function: function.name.clone(),
            message,
        })
    }
}
