use std::sync::Arc;

use tracing::{debug, error};

use super::{ScanDocument, ScanResult, SecretScanner};
use crate::credential::CredentialProvider;
use crate::error::{Result, ExtensionError};

/// Scans documents with the GitGuardian multiscan API.
///
/// One POST per call, bearer-authenticated, no retry.
pub struct GitGuardianClient {
    endpoint: String,
    credentials: Arc<CredentialProvider>,
    client: reqwest::Client,
}

impl GitGuardianClient {
    pub fn new(endpoint: impl Into<String>, credentials: Arc<CredentialProvider>) -> Self {
        Self::with_client(endpoint, credentials, reqwest::Client::new())
    }

    pub fn with_client(
        endpoint: impl Into<String>,
        credentials: Arc<CredentialProvider>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials,
            client,
        }
    }
}

#[async_trait::async_trait]
impl SecretScanner for GitGuardianClient {
    async fn scan(&self, documents: &[ScanDocument]) -> Result<Vec<ScanResult>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self.credentials.get().await?;
        debug!("Posting {} document(s) to {}", documents.len(), self.endpoint);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(documents)
            .send()
            .await
            .map_err(|e| {
                error!("Scan request to {} failed: {}", self.endpoint, e);
                ExtensionError::ScanService {
                    status: None,
                    body: e.to_string(),
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = match resp.text().await {
                Ok(text) => text,
                Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            error!("Scan failed with status {}", status);
            return Err(ExtensionError::ScanService {
                status: Some(status.as_u16()),
                body,
            });
        }

        resp.json::<Vec<ScanResult>>()
            .await
            .map_err(|e| ExtensionError::ScanService {
                status: Some(status.as_u16()),
                body: format!("invalid response body: {}", e),
            })
    }

    fn name(&self) -> &str {
        "gitguardian"
    }
}
