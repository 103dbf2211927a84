//! Pipeline validation and execution

pub mod engine;
pub mod validator;

pub use engine::{CancelToken, EngineConfig, ExecutionEngine, ExecutionEvent, EventHandler};
pub use validator::{validate, Slot, ValidationError, ValidationResult};
