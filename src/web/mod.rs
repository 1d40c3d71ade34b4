//! HTTP surface: the connectivity check plus liveness/status probes.

pub mod connectivity;
pub mod middleware;
pub mod routes;
pub mod status;

pub use routes::*;
