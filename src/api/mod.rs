//! API endpoint handlers module
//!
//! Status and control endpoints for the credential pool.

pub mod health;
pub mod token_status;
