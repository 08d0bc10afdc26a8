//! Refresh-token persistence seam.

use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;

/// Key under which the refresh token is persisted.
pub const REFRESH_TOKEN_KEY: &str = "hasura-auth.refresh-token";

/// Error type for token store operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for token store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for token storage backends.
pub trait TokenStore: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value
    fn delete(&self, key: &str) -> StorageResult<bool>;
}

/// In-memory token store. Tokens do not outlive the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a refresh token, as if a previous run had saved it.
    pub fn with_refresh_token(token: &str) -> Self {
        let store = Self::new();
        store
            .data
            .lock()
            .insert(REFRESH_TOKEN_KEY.to_string(), token.to_string());
        store
    }
}

impl TokenStore for MemoryTokenStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }
}
