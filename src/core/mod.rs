//! Core domain models
//!
//! This module defines the value types, the variable environment, the
//! function registry, pipelines, validation outcomes and the records a run
//! produces.

pub mod config;
pub mod defaults;
pub mod function;
pub mod pipeline;
pub mod state;
pub mod types;
pub mod validation;
pub mod variable;

pub use function::*;
pub use pipeline::*;
pub use state::*;
pub use types::*;
pub use validation::*;
pub use variable::*;
