//! Workflow execution runtime
//!
//! This crate provides the scheduler that runs workflows: the action
//! registry, per-node retry and timeout handling, edge activation and the
//! batch loop that drives a run to its EXECUTION_COMPLETED event.

pub mod activation;
mod executor;
mod registry;
mod retry;
mod runtime;

pub use executor::{EventCallback, ExecutionResult, RunOptions, WorkflowExecutor};
pub use registry::ActionRegistry;
pub use retry::{RetryError, RetryPolicy};
pub use runtime::{RelayRuntime, RunHandle, RuntimeConfig};
