//! Credential Pool Module
//!
//! Tracks a fixed, ordered set of primary credentials, which one is current,
//! which ones are healthy, and the derived session credential of each.
//!
//! # Example
//! ```
//! use copilot_token_pool::services::credential_pool::CredentialPool;
//!
//! let pool = CredentialPool::new(["ghu_first", "ghu_second"]).unwrap();
//! assert_eq!(pool.current().primary(), "ghu_first");
//!
//! pool.advance();
//! assert_eq!(pool.current().primary(), "ghu_second");
//! ```

mod entry;
mod pool;

pub use entry::{CredentialEntry, EntryStatus, PoolStats};
pub use pool::{ChangeListener, CredentialPool};
