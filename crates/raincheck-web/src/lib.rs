//! HTTP server for raincheck.
//!
//! This crate exposes the code review API and the authentication that
//! guards it:
//!
//! - [`auth`]: the [`AuthGate`] middleware and its three strategies.
//! - [`api`]: route handlers for analysis, stats and API key management.
//! - [`analysis`]: the pluggable code analysis backend.
//! - [`config`]: TOML + environment configuration.
//! - [`server`]: router composition and startup.

pub mod analysis;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod state;

pub use auth::{AuthGate, AuthenticatedIdentity, VerificationStrategy};
pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{RouteGates, WebServer, router};
pub use state::AppState;
