//! Services module
//!
//! Credential pooling, rotation-aware execution, and session-token refresh.

pub mod credential_pool;
pub mod exchange;
pub mod executor;
pub mod facade;
pub mod refresh;

pub use credential_pool::{ChangeListener, CredentialEntry, CredentialPool, EntryStatus, PoolStats};
pub use exchange::{CredentialExchange, DerivedCredential, GithubTokenExchange};
pub use executor::{should_rotate, ResilientExecutor, DEFAULT_MAX_ROUNDS};
pub use facade::{
    build_facade, rotate_token, token_status, CredentialFacade, PooledPrimary, SinglePrimary,
};
pub use refresh::{RefreshConfig, RefreshScheduler};
