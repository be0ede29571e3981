//! Configuration types for the extension.
//!
//! The top-level [`AppConfig`] is either deserialized from a TOML file passed
//! with `--config`, or assembled from the Lambda execution environment by
//! [`AppConfig::from_env`].
//!
//! # Example `gitguardian-extension.toml`
//!
//! ```toml
//! [proxy]
//! listen_port = 9009
//! runtime_api_endpoint = "${AWS_LAMBDA_RUNTIME_API}"
//!
//! [scanner]
//! endpoint = "https://api.gitguardian.com/v1/multiscan"
//!
//! [credential]
//! ssm_key_path = "/gitguardian/apikey"
//!
//! [extension]
//! events = ["INVOKE", "SHUTDOWN"]
//! ```

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ExtensionError};

pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";
pub const DEFAULT_LISTENER_PORT: u16 = 9009;
pub const DEFAULT_SSM_KEY_PATH: &str = "/gitguardian/apikey";
pub const DEFAULT_SCAN_ENDPOINT: &str = "https://api.gitguardian.com/v1/multiscan";
pub const DEFAULT_SCAN_FILENAME: &str = "lambda_response.json";
pub const DEFAULT_EXTENSION_NAME: &str = "gitguardian-extension";

/// Path prefix of the runtime API, shared by the local listener and upstream.
pub const RUNTIME_API_PREFIX: &str = "/2018-06-01/runtime";
/// Path prefix of the extensions API.
pub const EXTENSIONS_API_PREFIX: &str = "/2020-01-01/extension";

/// Local interception server and upstream runtime API (`[proxy]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Interface to bind the local listener on.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    /// Port the function runtime is pointed at.
    #[serde(default = "default_listener_port")]
    pub listen_port: u16,
    /// `host:port` of the real runtime API.
    pub runtime_api_endpoint: String,
    /// Inject `"gitguardian-processed": true` into proxied payloads.
    #[serde(default = "default_true")]
    pub mark_processed: bool,
}

impl ProxyConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// Base URL of the real runtime API, e.g. `http://127.0.0.1:9001/2018-06-01/runtime`.
    pub fn runtime_api_url(&self) -> String {
        format!("http://{}{}", self.runtime_api_endpoint, RUNTIME_API_PREFIX)
    }
}

/// Remote secret-detection service (`[scanner]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScannerConfig {
    #[serde(default = "default_scan_endpoint")]
    pub endpoint: String,
    /// Document name sent to the service for scanned response bodies.
    #[serde(default = "default_scan_filename")]
    pub filename: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_scan_endpoint(),
            filename: default_scan_filename(),
        }
    }
}

/// Where the scanning service's API key lives (`[credential]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialConfig {
    /// SSM parameter name, fetched with decryption.
    #[serde(default = "default_ssm_key_path")]
    pub ssm_key_path: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            ssm_key_path: default_ssm_key_path(),
        }
    }
}

/// Extension lifecycle registration (`[extension]` section).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtensionConfig {
    /// Register with the extensions API and run the event loop.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Value of the `Lambda-Extension-Name` header.
    #[serde(default = "default_extension_name")]
    pub name: String,
    /// Event types to subscribe to.
    #[serde(default = "default_events")]
    pub events: Vec<String>,
    /// `host:port` of the extensions API. Falls back to `proxy.runtime_api_endpoint`.
    #[serde(default)]
    pub extensions_api_endpoint: Option<String>,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: default_extension_name(),
            events: default_events(),
            extensions_api_endpoint: None,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
    #[serde(default)]
    pub extension: ExtensionConfig,
}

impl AppConfig {
    /// Load and parse the configuration from a TOML file at the given path.
    ///
    /// Before parsing, `${VAR}` and `$VAR` placeholders in the TOML text are
    /// replaced with the corresponding environment variable values. An error is
    /// returned if a referenced variable is not set.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_with(&content, |name| std::env::var(name).ok())
    }

    /// Parse TOML text, resolving placeholders through `lookup`.
    pub fn parse_with<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = substitute_env_vars(content, &lookup)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// | Variable | Setting |
    /// |----------|---------|
    /// | `LRAP_RUNTIME_API_ENDPOINT` or `AWS_LAMBDA_RUNTIME_API` | `proxy.runtime_api_endpoint` |
    /// | `LRAP_LISTENER_PORT` | `proxy.listen_port` |
    /// | `AWS_LAMBDA_RUNTIME_API` | `extension.extensions_api_endpoint` |
    /// | `GITGUARDIAN_SSM_KEY_PATH` | `credential.ssm_key_path` |
    /// | `GITGUARDIAN_API_URL` | `scanner.endpoint` |
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lambda_api = lookup("AWS_LAMBDA_RUNTIME_API");
        let runtime_api_endpoint = lookup("LRAP_RUNTIME_API_ENDPOINT")
            .or_else(|| lambda_api.clone())
            .ok_or_else(|| ExtensionError::ConfigEnvVar("AWS_LAMBDA_RUNTIME_API".to_string()))?;

        let listen_port = match lookup("LRAP_LISTENER_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                ExtensionError::ConfigInvalid(format!("LRAP_LISTENER_PORT is not a port: {}", raw))
            })?,
            None => DEFAULT_LISTENER_PORT,
        };

        let mut scanner = ScannerConfig::default();
        if let Some(endpoint) = lookup("GITGUARDIAN_API_URL") {
            scanner.endpoint = endpoint;
        }

        let mut credential = CredentialConfig::default();
        if let Some(path) = lookup("GITGUARDIAN_SSM_KEY_PATH") {
            credential.ssm_key_path = path;
        }

        Ok(Self {
            proxy: ProxyConfig {
                listen_host: default_listen_host(),
                listen_port,
                runtime_api_endpoint,
                mark_processed: true,
            },
            scanner,
            credential,
            extension: ExtensionConfig {
                extensions_api_endpoint: lambda_api,
                ..ExtensionConfig::default()
            },
        })
    }

    /// Base URL of the extensions API, e.g. `http://127.0.0.1:9001/2020-01-01/extension`.
    pub fn extensions_api_url(&self) -> String {
        let endpoint = self
            .extension
            .extensions_api_endpoint
            .as_deref()
            .unwrap_or(&self.proxy.runtime_api_endpoint);
        format!("http://{}{}", endpoint, EXTENSIONS_API_PREFIX)
    }
}

/// Replace `${VAR_NAME}` and `$VAR_NAME` placeholders with looked-up values.
///
/// Returns an error containing the variable name if the variable is not set.
fn substitute_env_vars<F>(input: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    // ${VAR_NAME}
    let re_braces = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")?;
    // $VAR_NAME, uppercase only to avoid false positives
    let re_bare = Regex::new(r"\$([A-Z_][A-Z0-9_]*)")?;

    let mut result = input.to_string();

    for cap in re_braces.captures_iter(input) {
        let var_name = &cap[1];
        let value =
            lookup(var_name).ok_or_else(|| ExtensionError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    let intermediate = result.clone();
    for cap in re_bare.captures_iter(&intermediate) {
        let var_name = &cap[1];
        let value =
            lookup(var_name).ok_or_else(|| ExtensionError::ConfigEnvVar(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}

fn default_listen_host() -> String {
    DEFAULT_LISTEN_HOST.to_string()
}

fn default_listener_port() -> u16 {
    DEFAULT_LISTENER_PORT
}

fn default_true() -> bool {
    true
}

fn default_scan_endpoint() -> String {
    DEFAULT_SCAN_ENDPOINT.to_string()
}

fn default_scan_filename() -> String {
    DEFAULT_SCAN_FILENAME.to_string()
}

fn default_ssm_key_path() -> String {
    DEFAULT_SSM_KEY_PATH.to_string()
}

fn default_extension_name() -> String {
    DEFAULT_EXTENSION_NAME.to_string()
}

fn default_events() -> Vec<String> {
    vec!["INVOKE".to_string(), "SHUTDOWN".to_string()]
}
