use std::sync::OnceLock;

use tracing::{debug, error};

use super::{LifecycleClient, LifecycleEvent};
use crate::config::AppConfig;
use crate::error::{Result, ExtensionError};

const EXTENSION_NAME_HEADER: &str = "Lambda-Extension-Name";
const EXTENSION_ID_HEADER: &str = "Lambda-Extension-Identifier";

/// Client for the Lambda extensions API (`/2020-01-01/extension`).
pub struct ExtensionsApiClient {
    base_url: String,
    name: String,
    events: Vec<String>,
    client: reqwest::Client,
    extension_id: OnceLock<String>,
}

impl ExtensionsApiClient {
    pub fn new(base_url: String, name: String, events: Vec<String>) -> Self {
        Self {
            base_url,
            name,
            events,
            client: reqwest::Client::new(),
            extension_id: OnceLock::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.extensions_api_url(),
            config.extension.name.clone(),
            config.extension.events.clone(),
        )
    }

    pub fn extension_id(&self) -> Option<&str> {
        self.extension_id.get().map(String::as_str)
    }
}

#[async_trait::async_trait]
impl LifecycleClient for ExtensionsApiClient {
    async fn register(&self) -> Result<String> {
        debug!("Registering {} for events {:?}", self.name, self.events);
        let resp = self
            .client
            .post(format!("{}/register", self.base_url))
            .header(EXTENSION_NAME_HEADER, &self.name)
            .json(&serde_json::json!({ "events": self.events }))
            .send()
            .await
            .map_err(|e| ExtensionError::Registration(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("Failed to register");
            return Err(ExtensionError::Registration(format!(
                "status {}: {}",
                status, body
            )));
        }

        let id = resp
            .headers()
            .get(EXTENSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ExtensionError::Registration(format!(
                    "response has no {} header",
                    EXTENSION_ID_HEADER
                ))
            })?;

        let _ = self.extension_id.set(id.clone());
        Ok(id)
    }

    async fn next(&self) -> Result<LifecycleEvent> {
        let id = self
            .extension_id()
            .ok_or_else(|| ExtensionError::Lifecycle("extension is not registered".to_string()))?;

        let resp = self
            .client
            .get(format!("{}/event/next", self.base_url))
            .header(EXTENSION_ID_HEADER, id)
            .send()
            .await
            .map_err(|e| ExtensionError::Lifecycle(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ExtensionError::Lifecycle(format!(
                "failed to get next event: {}",
                resp.status()
            )));
        }

        resp.json::<LifecycleEvent>()
            .await
            .map_err(|e| ExtensionError::Lifecycle(format!("invalid event: {}", e)))
    }
}
