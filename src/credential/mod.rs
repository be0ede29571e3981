//! Scanning-service credential retrieval.
//!
//! The API key lives in an external secret store behind the [`SecretStore`]
//! trait. [`CredentialProvider`] fetches it on first use and keeps it for the
//! lifetime of the process. Concurrent first calls may each hit the store;
//! the first value written wins and later ones are dropped.

pub mod ssm;

use std::sync::{Arc, OnceLock};

use tracing::{debug, error};

use crate::error::{Result, ExtensionError};

/// A secret store that returns the decrypted value stored under a path.
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch and decrypt the value at `path`.
    async fn get(&self, path: &str) -> Result<String>;
    /// Backend name for logging (e.g., `"ssm"`).
    fn name(&self) -> &str;
}

/// Memoized accessor for the scanning service's API key.
pub struct CredentialProvider {
    store: Arc<dyn SecretStore>,
    key_path: String,
    cached: OnceLock<String>,
}

impl CredentialProvider {
    pub fn new(store: Arc<dyn SecretStore>, key_path: impl Into<String>) -> Self {
        Self {
            store,
            key_path: key_path.into(),
            cached: OnceLock::new(),
        }
    }

    /// Return the API key, hitting the store only when nothing is cached yet.
    pub async fn get(&self) -> Result<String> {
        if let Some(key) = self.cached.get() {
            return Ok(key.clone());
        }

        debug!("Fetching API key from {} at {}", self.store.name(), self.key_path);
        let key = self.store.get(&self.key_path).await.map_err(|e| {
            error!("Failed to get API key from {}: {}", self.store.name(), e);
            match e {
                ExtensionError::CredentialUnavailable(_) => e,
                other => ExtensionError::CredentialUnavailable(other.to_string()),
            }
        })?;

        // A concurrent fetch may have landed first; either value is the same secret.
        let _ = self.cached.set(key.clone());
        Ok(key)
    }

    pub fn is_cached(&self) -> bool {
        self.cached.get().is_some()
    }
}

/// An in-memory store that always returns the same value. Useful for local runs and tests.
pub struct StaticSecretStore {
    value: Option<String>,
}

impl StaticSecretStore {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    /// A store whose every lookup fails.
    pub fn empty() -> Self {
        Self { value: None }
    }
}

#[async_trait::async_trait]
impl SecretStore for StaticSecretStore {
    async fn get(&self, path: &str) -> Result<String> {
        self.value
            .clone()
            .ok_or_else(|| {
                ExtensionError::CredentialUnavailable(format!("parameter {} not found", path))
            })
    }

    fn name(&self) -> &str {
        "static"
    }
}
