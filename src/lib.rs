//! Copilot token pool library
//!
//! A pool of primary GitHub credentials with health tracking, a retry
//! executor that rotates through the pool on auth and rate-limit failures,
//! and a scheduler that keeps the derived session tokens fresh.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::{ApiError, PoolError, RefreshError, RotationSignal, UpstreamError};
pub use server::App;
pub use services::{CredentialFacade, CredentialPool, ResilientExecutor, RefreshScheduler};
