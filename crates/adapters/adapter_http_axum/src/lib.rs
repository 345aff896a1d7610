//! # fitbridge-adapter-http-axum
//!
//! HTTP control surface for the fitbridge core. A thin REST mapping of
//! the core operations: device discovery/connection, workout lifecycle,
//! history reads, FIT download, live status, and an SSE push channel.
//!
//! ## Dependency rule
//!
//! Depends on `fitbridge-app` (services and port traits) and
//! `fitbridge-domain` only. No domain logic lives here — handlers parse,
//! delegate, and map errors to status codes.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
