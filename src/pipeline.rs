//! Segment, scan and redact in one fail-open call.
//!
//! [`ScanPipeline::scan_and_redact`] never returns an error. If segmentation,
//! credential retrieval or the scanning service fails, the original content
//! comes back untouched with the error message in [`RedactionOutcome::error`].
//!
//! When content is split into several documents, each result's offsets are
//! converted to bytes against its own chunk, then shifted by that chunk's
//! position before redacting the whole content.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::{Result, ExtensionError};
use crate::redact::{self, RedactionOutcome, matches};
use crate::scan::SecretScanner;
use crate::scan::segment::Segmenter;

pub struct ScanPipeline {
    scanner: Arc<dyn SecretScanner>,
    segmenter: Segmenter,
}

impl ScanPipeline {
    pub fn new(scanner: Arc<dyn SecretScanner>) -> Self {
        Self {
            scanner,
            segmenter: Segmenter::default(),
        }
    }

    /// Override the segment limits.
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Scan `content` and return it with every finding redacted.
    pub async fn scan_and_redact(&self, content: &str, filename: &str) -> RedactionOutcome {
        info!("Scanning content for sensitive data");
        match self.try_scan_and_redact(content, filename).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Scan and redact failed: {}", e);
                RedactionOutcome::failed(content, e)
            }
        }
    }

    async fn try_scan_and_redact(&self, content: &str, filename: &str) -> Result<RedactionOutcome> {
        let segments = self.segmenter.segment(content, filename)?;
        let (documents, offsets): (Vec<_>, Vec<_>) =
            segments.into_iter().map(|s| (s.document, s.offset)).unzip();

        let results = self.scanner.scan(&documents).await?;
        info!(
            "Scan completed via {}, found {} result(s)",
            self.scanner.name(),
            results.len()
        );

        let outcome = if documents.len() == 1 {
            redact::redact(content, &results)
        } else {
            if results.len() != documents.len() {
                return Err(ExtensionError::ScanService {
                    status: None,
                    body: format!(
                        "expected {} results for {} documents, got {}",
                        documents.len(),
                        documents.len(),
                        results.len()
                    ),
                });
            }
            let found = documents
                .iter()
                .zip(&offsets)
                .zip(&results)
                .flat_map(|((doc, offset), result)| {
                    matches::flatten(result, &doc.content)
                        .into_iter()
                        .filter_map(move |m| {
                            let start = m.start;
                            let shifted = m.shifted(*offset);
                            if shifted.is_none() {
                                warn!(
                                    "Skipping match at {} in chunk at {}: offset overflow",
                                    start, offset
                                );
                            }
                            shifted
                        })
                })
                .collect();
            redact::redact_matches(content, found)
        };

        if outcome.is_redacted() {
            info!("Redacted {} sensitive item(s)", outcome.redactions.len());
        }
        Ok(outcome)
    }
}
