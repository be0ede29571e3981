//! AWS Systems Manager Parameter Store backend.
//!
//! Credentials for the SSM client are resolved in the standard AWS order;
//! inside Lambda that is the function's execution role.

use aws_config::BehaviorVersion;
use aws_sdk_ssm::Client;

use super::SecretStore;
use crate::error::{Result, ExtensionError};

/// Reads `SecureString` parameters with decryption.
pub struct SsmSecretStore {
    client: Client,
}

impl SsmSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the ambient AWS configuration.
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait::async_trait]
impl SecretStore for SsmSecretStore {
    async fn get(&self, path: &str) -> Result<String> {
        let output = self
            .client
            .get_parameter()
            .name(path)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                ExtensionError::CredentialUnavailable(format!("SSM GetParameter {}: {}", path, e))
            })?;

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| {
                let msg = format!("SSM parameter {} has no value", path);
                ExtensionError::CredentialUnavailable(msg)
            })
    }

    fn name(&self) -> &str {
        "ssm"
    }
}
