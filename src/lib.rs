//! fnpipe - typed function pipelines
//!
//! Functions with typed signatures are bound to named variables, composed
//! into ordered pipelines, checked before they run and executed step by step.

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runtime;

// Re-export commonly used types
pub use crate::core::config::WorkspaceConfig;
pub use crate::core::{
    FunctionDefinition, FunctionRegistry, PipelineDefinition, PipelineStep, RunReport, RunStatus,
    Value, ValueType, VariableEnvironment,
};
pub use execution::{validate, CancelToken, ExecutionEngine, ExecutionEvent, ValidationError};
pub use runtime::{FunctionInvoker, InvocationFault, NativeInvoker, ScriptInvoker};
