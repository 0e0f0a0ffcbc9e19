// ---------------------------------------------------------------------------
// handlers/: HTTP surface besides `/mcp`
// Sub-modules for logical grouping; mod.rs re-exports the handlers so routes
// in lib.rs read `handlers::*`.
// ---------------------------------------------------------------------------

// Sub-modules are pub so utoipa __path_* types are reachable from the ApiDoc derive.
pub mod health;
pub mod tools;

pub use health::{health, liveness, readiness, root};
pub use tools::{invoke_tool, list_tools};
