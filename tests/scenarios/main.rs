//! Scenario-based tests for fnpipe

mod helpers;

mod concurrent_runs;
mod failure_handling;
mod success_chain;
mod validation_gate;
mod variable_binding;
