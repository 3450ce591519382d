//! Configuration management module
//!
//! This module handles loading and validating application configuration
//! from environment variables and .env files, and locating the primary
//! credentials.

pub mod settings;
pub mod token_source;

pub use settings::{Settings, DEFAULT_SECRET_PATHS};
pub use token_source::{
    extract_secret_value, load_credentials, parse_tokens, resolve_token_source, TokenOrigin,
    TokenSource,
};
