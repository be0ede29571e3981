//! Splitting content into documents that fit the scanning service's limits.
//!
//! Sizes are measured in UTF-8 bytes throughout. Content up to
//! [`MAX_DOC_SIZE`] bytes is sent as one document under the given filename.
//! Larger content is cut into chunks of `MAX_DOC_SIZE - CHUNK_MARGIN` bytes,
//! each pulled back to the nearest preceding character boundary, and named
//! `<filename>.part<N>`. Every [`Segment`] records the byte offset of its
//! chunk in the original content so findings can be mapped back.

use super::ScanDocument;
use crate::error::{Result, ExtensionError};

/// Largest document the service accepts (1 MiB).
pub const MAX_DOC_SIZE: usize = 1024 * 1024;
/// Most documents accepted in one request.
pub const MAX_DOCS: usize = 20;
/// Headroom left in each chunk for request overhead.
pub const CHUNK_MARGIN: usize = 1000;

/// A document plus the byte offset of its content within the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub document: ScanDocument,
    pub offset: usize,
}

/// Size limits used when segmenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmenter {
    pub max_doc_size: usize,
    pub max_docs: usize,
    pub margin: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            max_doc_size: MAX_DOC_SIZE,
            max_docs: MAX_DOCS,
            margin: CHUNK_MARGIN,
        }
    }
}

impl Segmenter {
    fn chunk_size(&self) -> usize {
        // A chunk must be able to hold at least one 4-byte character.
        self.max_doc_size.saturating_sub(self.margin).max(4)
    }

    /// Split `content` into segments, or fail if more than `max_docs` would be needed.
    pub fn segment(&self, content: &str, filename: &str) -> Result<Vec<Segment>> {
        if content.len() <= self.max_doc_size {
            return Ok(vec![Segment {
                document: ScanDocument {
                    filename: filename.to_string(),
                    content: content.to_string(),
                },
                offset: 0,
            }]);
        }

        let bounds = chunk_bounds(content, self.chunk_size());
        if bounds.len() > self.max_docs {
            return Err(ExtensionError::ContentTooLarge {
                chunks: bounds.len(),
                max: self.max_docs,
            });
        }

        Ok(bounds
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Segment {
                document: ScanDocument {
                    filename: format!("{}.part{}", filename, i),
                    content: content[start..end].to_string(),
                },
                offset: start,
            })
            .collect())
    }
}

/// Segment with the default service limits.
pub fn segment(content: &str, filename: &str) -> Result<Vec<Segment>> {
    Segmenter::default().segment(content, filename)
}

/// Byte ranges of consecutive chunks, each ending on a character boundary.
fn chunk_bounds(content: &str, chunk_size: usize) -> Vec<(usize, usize)> {
    let len = content.len();
    let mut bounds = Vec::with_capacity(len / chunk_size + 1);
    let mut start = 0;
    while start < len {
        let mut end = (start + chunk_size).min(len);
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        bounds.push((start, end));
        start = end;
    }
    bounds
}
