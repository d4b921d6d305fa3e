//! # TeamTask Shared Library
//!
//! This crate contains the domain core and the application services used by
//! the TeamTask API server.
//!
//! ## Module Organization
//!
//! - `models`: Groups, tasks and labels, including the role resolver and the
//!   group-task completion aggregator
//! - `auth`: Token validation and authorization guards
//! - `store`: Storage ports with in-memory and PostgreSQL adapters
//! - `db`: PostgreSQL pool and migrations
//! - `notify`: Notification intents and sinks
//! - `services`: Application services that tie the above together

pub mod auth;
pub mod db;
pub mod models;
pub mod notify;
pub mod services;
pub mod store;

/// Current version of the TeamTask shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
