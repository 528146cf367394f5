//! Shadowbox Manager REST Service library surface. `main.rs` is a thin
//! wrapper over this; tests/ integration tests drive `router::build_router`
//! directly via `tower::ServiceExt::oneshot`.

pub mod api;
pub mod cli;
pub mod middleware;
pub mod router;
pub mod state;
