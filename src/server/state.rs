//! Application state container
//!
//! Shared state handed to every status handler via Axum's state extraction.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::services::CredentialFacade;

/// Shared application state
///
/// Cheap to clone; everything behind it is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,

    /// Credential access for the running process
    pub facade: Arc<dyn CredentialFacade>,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, facade: Arc<dyn CredentialFacade>) -> Self {
        Self {
            settings: Arc::new(settings),
            facade,
            start_time: Instant::now(),
        }
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

