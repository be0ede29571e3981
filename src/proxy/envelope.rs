//! Rewriting of invocation payloads passing through the proxy.
//!
//! A function response envelope looks like `{"statusCode": 200, "headers": {...},
//! "body": "<JSON text>"}`. Only the nested `body` string is scanned. Anything
//! that fails to parse is forwarded exactly as received.

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ExtensionError};
use crate::pipeline::ScanPipeline;
use crate::redact::{PLACEHOLDER, RedactionOutcome};

/// Key set to `true` on payloads that went through the proxy.
pub const PROCESSED_MARKER: &str = "gitguardian-processed";
/// Key of the audit metadata object added to redacted bodies.
pub const METADATA_KEY: &str = "_gitguardian";

/// Add the processed marker to a JSON object payload.
///
/// Returns `None` when the payload is not a JSON object.
pub fn mark_processed(payload: &[u8]) -> Option<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(payload).ok()?;
    value
        .as_object_mut()?
        .insert(PROCESSED_MARKER.to_string(), Value::Bool(true));
    serde_json::to_vec(&value).ok()
}

/// Scan and redact the nested body of a response envelope.
///
/// Returns the bytes to forward upstream. On any parse failure the input is
/// returned unchanged.
pub async fn process_response(
    pipeline: &ScanPipeline,
    raw: &[u8],
    filename: &str,
    mark: bool,
) -> Vec<u8> {
    let mut envelope: Map<String, Value> = match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!("Response envelope is not a JSON object, forwarding unmodified");
            return raw.to_vec();
        }
        Err(e) => {
            warn!("Could not parse response envelope ({}), forwarding unmodified", e);
            return raw.to_vec();
        }
    };

    let new_body = match envelope.get("body") {
        Some(Value::String(body)) if !body.is_empty() => {
            match redact_body(pipeline, body, filename).await {
                Ok(new_body) => new_body,
                Err(e) => {
                    warn!("Error processing response body: {}", e);
                    None
                }
            }
        }
        Some(_) => {
            debug!("Response body is not a string, skipping scan");
            None
        }
        None => None,
    };

    if let Some(body) = new_body {
        envelope.insert("body".to_string(), Value::String(body));
    }
    if mark {
        envelope.insert(PROCESSED_MARKER.to_string(), Value::Bool(true));
    }

    match serde_json::to_vec(&Value::Object(envelope)) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to serialize response envelope ({}), forwarding unmodified", e);
            raw.to_vec()
        }
    }
}

/// Scan the JSON text in `body`. `Ok(None)` means nothing was redacted.
async fn redact_body(
    pipeline: &ScanPipeline,
    body: &str,
    filename: &str,
) -> Result<Option<String>> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| ExtensionError::EnvelopeParse(format!("body is not JSON: {}", e)))?;
    let content = parsed.to_string();

    let outcome = pipeline.scan_and_redact(&content, filename).await;
    if let Some(err) = &outcome.error {
        error!("Scanning error: {}", err);
    }
    if !outcome.is_redacted() {
        info!("No sensitive content detected");
        return Ok(None);
    }

    info!(
        "Found and redacted {} sensitive item(s)",
        outcome.redactions.len()
    );
    Ok(Some(rebuild_body(body, &outcome)))
}

/// Serialize the redacted body, attaching audit metadata to JSON objects.
///
/// If the redacted text is no longer valid JSON, every recorded original is
/// replaced in the raw body instead. Identical text elsewhere in the body is
/// replaced too.
fn rebuild_body(raw_body: &str, outcome: &RedactionOutcome) -> String {
    match serde_json::from_str::<Value>(&outcome.content) {
        Ok(Value::Object(mut obj)) => {
            obj.insert(
                METADATA_KEY.to_string(),
                serde_json::json!({
                    "redacted": true,
                    "redaction_count": outcome.redactions.len(),
                    "redaction_types": outcome.redaction_types(),
                }),
            );
            Value::Object(obj).to_string()
        }
        Ok(other) => other.to_string(),
        Err(_) => {
            warn!("Failed to parse redacted content, using string replacement");
            outcome
                .redactions
                .iter()
                .fold(raw_body.to_string(), |body, r| body.replace(&r.original, PLACEHOLDER))
        }
    }
}
