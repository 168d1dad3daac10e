//! Workflow engine core for stepwise.
//!
//! This crate defines the engine and the "ports" that the infrastructure
//! layer implements: the tool-invocation contract (`tool::ToolInvoker`) and
//! the execution store (`repository::execution::ExecutionStore`). It depends
//! only on `stepwise-types` -- never on `stepwise-infra` or any network crate.

pub mod repository;
pub mod tool;
pub mod workflow;

#[cfg(test)]
mod testing;
