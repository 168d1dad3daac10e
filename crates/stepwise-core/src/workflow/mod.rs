//! Workflow engine core: definitions, context resolution, step dispatch,
//! retry policy, sequential execution and the execution registry.
//!
//! - `definition` -- YAML/JSON parsing, validation, filesystem discovery
//! - `context` -- Per-execution context store
//! - `resolve` -- `${dotted.path}` value resolution (fail-soft)
//! - `expression` -- Restricted JEXL evaluator for expression-mode steps
//! - `step_runner` -- Dispatches a step to tool, expression or template mode
//! - `retry` -- Retry loop and on_error policy
//! - `executor` -- Sequential workflow runner and caller-facing API
//! - `registry` -- In-memory execution store with retention cap

pub mod context;
pub mod definition;
pub mod executor;
pub mod expression;
pub mod registry;
pub mod resolve;
pub mod retry;
pub mod step_runner;
