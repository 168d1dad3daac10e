//! Infrastructure layer for stepwise.
//!
//! Contains the collaborator-side implementations of the ports defined in
//! `stepwise-core`: in-process and HTTP tool invokers, the routing invoker
//! that picks between them, and configuration loading from the data
//! directory.

pub mod config;
pub mod tool;
