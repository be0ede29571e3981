use thiserror::Error;

/// Unified error type for the extension library.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Extension registration failed: {0}")]
    Registration(String),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("Runtime API unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("GitGuardian API error {}: {body}", fmt_status(.status))]
    ScanService { status: Option<u16>, body: String },

    #[error("Content would need {chunks} chunks (>{max}); aborting")]
    ContentTooLarge { chunks: usize, max: usize },

    #[error("Envelope parse error: {0}")]
    EnvelopeParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Environment variable not set: {0}")]
    ConfigEnvVar(String),

    #[error("Invalid config: {0}")]
    ConfigInvalid(String),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExtensionError>;

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "(no status)".to_string(),
    }
}
