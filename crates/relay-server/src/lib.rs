//! E2EE signaling relay — routes opaque encrypted payloads between
//! client-chosen identifiers without ever inspecting them.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// CLI argument parsing and server configuration.
pub mod config;
mod connection;
/// Error types for relay server operations.
pub mod error;
/// Prometheus metrics and read-only HTTP probes.
pub mod metrics;
/// Identifier-keyed connection registry and public key cache.
pub mod registry;
/// Accept loop and shared server state.
pub mod server;

pub use server::{run, run_with_shutdown, ServerState};
