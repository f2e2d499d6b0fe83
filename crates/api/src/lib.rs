//! NeuroVid HTTP API library.
//!
//! Exposes config, state, error handling and routes so the binary and the
//! integration tests build the same router.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
