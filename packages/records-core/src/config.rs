//! Store and service configuration.

use std::path::PathBuf;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Data directory for the snapshot file (None keeps the store in memory)
    pub data_dir: Option<PathBuf>,
    /// Maximum retry attempts for transient I/O errors
    pub persistence_max_retries: u32,
    /// Delay between retry attempts in milliseconds
    pub persistence_retry_delay_ms: u64,
    /// Page size used when a list request has no `limit`
    pub default_page_size: usize,
    /// Upper bound applied to a requested `limit`
    pub max_page_size: usize,
    /// Request body read timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            persistence_max_retries: 3,
            persistence_retry_delay_ms: 100,
            default_page_size: 100,
            max_page_size: 1000,
            request_timeout_ms: 5000,
        }
    }
}
