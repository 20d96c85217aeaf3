//! Wiki page storage reachable over an in-process message bus.
//!
//! ## Modules
//!
//! - [`bus`] – address based request/reply bus
//! - [`config`] – environment configuration
//! - [`database`] – query catalog, connection pool, page repository
//! - [`features::pages`] – action dispatcher, payloads, typed client
//! - [`services`] – service startup and shutdown

pub mod bus;
pub mod config;
pub mod database;
pub mod error;
pub mod features;
pub mod logger;
pub mod services;

#[cfg(test)]
mod tests;

pub use error::{ErrorCode, WikiDbError};
