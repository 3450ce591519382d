//! Utility modules
//!
//! Backoff for transient upstream failures and string helpers for logs.

pub mod retry;
pub mod string;

pub use retry::{retry_with_backoff, RetryConfig, RetryResult};
pub use string::{mask_secret, truncate_str, truncate_with_suffix};
