//! Bosun HTTP API: Axum router, shared state and authentication.

pub mod middleware;
pub mod routes;
pub mod state;
