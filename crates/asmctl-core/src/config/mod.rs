//! Configuration and profile management
//!
// Allow nested config module - this is intentional for the config subsystem

#![allow(clippy::module_inception)]
//!
//! This module provides subscription profiles, credential resolution and the
//! default wait settings used by the await loop and the state poller.
//!
//! # Features
//!
//! - Multiple named profiles for different subscriptions
//! - Environment variable override and `${VAR}` expansion in config files
//! - Platform-specific config file locations
//! - A `[wait]` table that always produces a bounded wait unless
//!   `unbounded = true` is set explicitly

pub mod config;
pub mod credential;
pub mod error;

// Re-export main types for convenience
pub use config::{Config, Profile, WaitConfig};
pub use credential::{CERT_DATA_ENV, CredentialStore, Credentials, SUBSCRIPTION_ID_ENV};
pub use error::{ConfigError, Result};
