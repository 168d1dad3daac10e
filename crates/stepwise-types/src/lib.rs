//! Shared domain types for stepwise.
//!
//! Workflow definitions, execution records, engine configuration and the
//! error types shared between the engine and its callers.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod workflow;
