//! Library crate for race-lobby-back, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Persistence gateway for finished races.
pub mod dao;
/// Wire and HTTP payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Race lobby services.
pub mod services;
/// Shared in-memory state.
pub mod state;
