//! Repository trait definitions (ports).
//!
//! These traits define the storage interface for execution records. The
//! in-memory implementation lives in `workflow::registry`; a persistent
//! backend only has to implement the same trait.

pub mod execution;
