//! Rewriting content to remove matched secrets.
//!
//! [`redact`] takes the original text and the scanner's findings, replaces
//! every matched span with [`PLACEHOLDER`], and returns a [`RedactionOutcome`]
//! listing what was removed.
//!
//! Spans are applied from the highest `start` to the lowest, so earlier byte
//! offsets stay valid while later text is being replaced. The `original` of
//! each [`RedactionRecord`] is read from the untouched input. Records are
//! returned in that same descending order.

pub mod matches;

use serde::Serialize;

pub use matches::Match;

use crate::scan::ScanResult;

/// Text substituted for every redacted span.
pub const PLACEHOLDER: &str = "[REDACTED]";

/// Audit entry for a single applied redaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactionRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub start: usize,
    pub end: usize,
    /// Exact text removed, taken from the original content.
    pub original: String,
    pub policy: String,
}

/// Rewritten content plus its audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactionOutcome {
    pub content: String,
    pub redactions: Vec<RedactionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RedactionOutcome {
    /// Content passed through with nothing removed.
    pub fn unchanged(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            redactions: Vec::new(),
            error: None,
        }
    }

    /// Content passed through because scanning failed.
    pub fn failed(content: impl Into<String>, error: impl ToString) -> Self {
        Self {
            content: content.into(),
            redactions: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_redacted(&self) -> bool {
        !self.redactions.is_empty()
    }

    /// Distinct redaction types in first-seen order.
    pub fn redaction_types(&self) -> Vec<String> {
        let mut types: Vec<String> = Vec::new();
        for r in &self.redactions {
            if !types.contains(&r.record_type) {
                types.push(r.record_type.clone());
            }
        }
        types
    }
}

/// Redact `content` using results whose offsets refer to `content` itself.
///
/// Only valid for a single scanned document. For chunked content, translate
/// offsets first and call [`redact_matches`].
pub fn redact(content: &str, results: &[ScanResult]) -> RedactionOutcome {
    if results.is_empty() {
        return RedactionOutcome::unchanged(content);
    }
    redact_matches(content, matches::flatten_all(results, content))
}

/// Redact `content` at the given canonical spans (byte offsets).
pub fn redact_matches(content: &str, found: Vec<Match>) -> RedactionOutcome {
    let spans = matches::coalesce(content, found);
    if spans.is_empty() {
        return RedactionOutcome::unchanged(content);
    }

    let mut rewritten = content.to_string();
    let mut redactions = Vec::with_capacity(spans.len());
    for span in spans {
        rewritten.replace_range(span.start..span.end, PLACEHOLDER);
        redactions.push(RedactionRecord {
            original: content[span.start..span.end].to_string(),
            record_type: span.match_type,
            start: span.start,
            end: span.end,
            policy: span.policy,
        });
    }

    RedactionOutcome {
        content: rewritten,
        redactions,
        error: None,
    }
}
