//! Error types
//!
//! Pool construction errors, upstream failures and the classification hook
//! used by the resilient executor, plus the JSON error body of the status API.

mod types;

pub use types::{ApiError, PoolError, RefreshError, RotationSignal, UpstreamError};
