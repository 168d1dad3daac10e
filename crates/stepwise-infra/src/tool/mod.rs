//! Tool-invocation implementations.
//!
//! - `local` -- In-process async handlers keyed by `(service, tool)`
//! - `http` -- JSON-over-HTTP client for configured tool services
//! - `router` -- Tries the local toolbox first, then HTTP

pub mod http;
pub mod local;
pub mod router;

pub use http::HttpToolInvoker;
pub use local::LocalToolbox;
pub use router::ToolRouter;
