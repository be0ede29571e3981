//! Remote secret scanning.
//!
//! Content is cut into [`ScanDocument`]s by the [`segment`] module and sent in a
//! single batch to a [`SecretScanner`]. The production scanner is
//! [`client::GitGuardianClient`], which talks to the GitGuardian multiscan API.
//!
//! The result types mirror the service's JSON loosely: every field is optional
//! on the wire, and match offsets may arrive as `index_start`/`index_end` or as
//! `start`/`end`. Normalization into one canonical shape happens in
//! [`crate::redact`].

pub mod client;
pub mod segment;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A named piece of content submitted for scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDocument {
    pub filename: String,
    /// Serialized as `document`, the field name the service expects.
    #[serde(rename = "document")]
    pub content: String,
}

/// Per-document scan result, in the same order as the submitted documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub policy_break_count: usize,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub policy_breaks: Vec<PolicyBreak>,
}

/// A detector hit: the secret type, the policy it violates, and where it was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyBreak {
    #[serde(rename = "type", default)]
    pub break_type: String,
    #[serde(default)]
    pub policy: String,
    #[serde(default)]
    pub matches: Vec<RawMatch>,
}

/// A located span as reported by the service, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    /// Inclusive end convention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_end: Option<usize>,
    /// Exclusive end convention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
}

/// Trait for remote secret scanners.
///
/// Implementations must be `Send + Sync` for use across async tasks.
#[async_trait::async_trait]
pub trait SecretScanner: Send + Sync {
    /// Scan all documents in one request. Results are returned in document order.
    async fn scan(&self, documents: &[ScanDocument]) -> Result<Vec<ScanResult>>;
    /// Backend name for logging (e.g., `"gitguardian"`).
    fn name(&self) -> &str;
}
