//! Normalization of scanner findings into canonical [`Match`] spans.
//!
//! The scanning service reports positions as character indices into the
//! document it was sent. [`flatten`] converts them to byte offsets against
//! that document's text, so every [`Match`] can be sliced directly.

use serde::Serialize;
use tracing::warn;

use crate::scan::{RawMatch, ScanResult};

/// A located secret in canonical form: byte offsets, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub match_type: String,
    pub policy: String,
}

impl Match {
    /// Convert a raw service match, or `None` if it carries no usable range.
    ///
    /// `index_start`/`index_end` use an inclusive end and take precedence;
    /// `start`/`end` are already exclusive. Positions stay in the service's
    /// units (characters); see [`CharOffsets`].
    pub fn from_raw(raw: &RawMatch, break_type: &str, policy: &str) -> Option<Self> {
        let start = raw.index_start.or(raw.start)?;
        let end = match raw.index_end {
            Some(inclusive) => inclusive.checked_add(1)?,
            None => raw.end?,
        };
        Some(Self {
            start,
            end,
            match_type: break_type.to_string(),
            policy: policy.to_string(),
        })
    }

    /// Move the span by `offset` bytes, or `None` if that overflows.
    pub fn shifted(mut self, offset: usize) -> Option<Self> {
        self.start = self.start.checked_add(offset)?;
        self.end = self.end.checked_add(offset)?;
        Some(self)
    }

    /// Re-express a character-indexed span as byte offsets into `offsets`' text.
    fn into_bytes(mut self, offsets: &CharOffsets<'_>) -> Option<Self> {
        self.start = offsets.byte_offset(self.start)?;
        self.end = offsets.byte_offset(self.end)?;
        Some(self)
    }
}

/// Character index to byte offset lookup for one document.
pub struct CharOffsets<'a> {
    text: &'a str,
    /// Byte offset of every character, empty for ASCII text.
    starts: Vec<usize>,
}

impl<'a> CharOffsets<'a> {
    pub fn new(text: &'a str) -> Self {
        let starts = if text.is_ascii() {
            Vec::new()
        } else {
            text.char_indices().map(|(b, _)| b).collect()
        };
        Self { text, starts }
    }

    /// Byte offset of character `index`. The character count maps to the
    /// text length; anything past it is `None`.
    pub fn byte_offset(&self, index: usize) -> Option<usize> {
        if self.starts.is_empty() {
            return (index <= self.text.len()).then_some(index);
        }
        match self.starts.get(index) {
            Some(b) => Some(*b),
            None if index == self.starts.len() => Some(self.text.len()),
            None => None,
        }
    }
}

/// Flatten every match of every policy break in `result`, in byte offsets
/// of `text`, the document the result was produced for.
pub fn flatten(result: &ScanResult, text: &str) -> Vec<Match> {
    if result.policy_breaks.is_empty() {
        return Vec::new();
    }
    let offsets = CharOffsets::new(text);
    result
        .policy_breaks
        .iter()
        .flat_map(|brk| {
            brk.matches
                .iter()
                .filter_map(|raw| Match::from_raw(raw, &brk.break_type, &brk.policy))
        })
        .filter_map(|m| {
            let (start, end) = (m.start, m.end);
            let converted = m.into_bytes(&offsets);
            if converted.is_none() {
                warn!(
                    "Skipping match {}..{} outside document of {} characters",
                    start,
                    end,
                    text.chars().count()
                );
            }
            converted
        })
        .collect()
}

/// Flatten all results of a single document `text`.
pub fn flatten_all(results: &[ScanResult], text: &str) -> Vec<Match> {
    results.iter().flat_map(|r| flatten(r, text)).collect()
}

/// Drop matches that cannot be applied to `content` and merge intersecting ones.
///
/// The result is sorted by `start` descending with no two spans overlapping.
/// Identical spans collapse to one. Touching spans (`a.end == b.start`) stay
/// separate. A merged span keeps the type and policy of its earliest match.
pub fn coalesce(content: &str, mut matches: Vec<Match>) -> Vec<Match> {
    matches.retain(|m| {
        let ok = m.start < m.end
            && m.end <= content.len()
            && content.is_char_boundary(m.start)
            && content.is_char_boundary(m.end);
        if !ok {
            warn!(
                "Skipping match {}..{} ({}) outside content of {} bytes",
                m.start,
                m.end,
                m.match_type,
                content.len()
            );
        }
        ok
    });

    // Ascending start; for equal starts the widest span leads.
    matches.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut merged: Vec<Match> = Vec::with_capacity(matches.len());
    for m in matches {
        match merged.last_mut() {
            Some(last) if m.start < last.end => {
                last.end = last.end.max(m.end);
            }
            _ => merged.push(m),
        }
    }

    merged.reverse();
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::PolicyBreak;

    fn m(start: usize, end: usize, t: &str) -> Match {
        Match {
            start,
            end,
            match_type: t.to_string(),
            policy: "Secrets detection".to_string(),
        }
    }

    #[test]
    fn index_fields_use_inclusive_end() {
        let raw = RawMatch {
            index_start: Some(5),
            index_end: Some(9),
            ..RawMatch::default()
        };
        let got = Match::from_raw(&raw, "AWS Keys", "Secrets detection").unwrap();
        assert_eq!((got.start, got.end), (5, 10));
        assert_eq!(got.match_type, "AWS Keys");
    }

    #[test]
    fn plain_fields_are_exclusive() {
        let raw = RawMatch {
            start: Some(5),
            end: Some(10),
            ..RawMatch::default()
        };
        let got = Match::from_raw(&raw, "t", "p").unwrap();
        assert_eq!((got.start, got.end), (5, 10));
    }

    #[test]
    fn zero_index_start_is_kept() {
        let raw = RawMatch {
            index_start: Some(0),
            index_end: Some(3),
            start: Some(7),
            ..RawMatch::default()
        };
        let got = Match::from_raw(&raw, "t", "p").unwrap();
        assert_eq!((got.start, got.end), (0, 4));
    }

    #[test]
    fn match_without_range_is_dropped() {
        let raw = RawMatch {
            matched: Some("secret".to_string()),
            ..RawMatch::default()
        };
        assert!(Match::from_raw(&raw, "t", "p").is_none());
    }

    #[test]
    fn flatten_carries_break_type_and_policy() {
        let result = ScanResult {
            policy_break_count: 2,
            policies: vec![],
            policy_breaks: vec![
                PolicyBreak {
                    break_type: "AWS Keys".to_string(),
                    policy: "Secrets detection".to_string(),
                    matches: vec![
                        RawMatch {
                            index_start: Some(1),
                            index_end: Some(2),
                            ..RawMatch::default()
                        },
                        RawMatch {
                            index_start: Some(4),
                            index_end: Some(6),
                            ..RawMatch::default()
                        },
                    ],
                },
                PolicyBreak {
                    break_type: "GitHub Token".to_string(),
                    policy: "Secrets detection".to_string(),
                    matches: vec![RawMatch {
                        start: Some(10),
                        end: Some(12),
                        ..RawMatch::default()
                    }],
                },
            ],
        };
        let matches = flatten(&result, "0123456789ABCDEF");
        assert_eq!(matches.len(), 3);
        assert_eq!(matches[2].match_type, "GitHub Token");
        assert_eq!((matches[2].start, matches[2].end), (10, 12));
    }

    #[test]
    fn coalesce_orders_descending() {
        let got = coalesce("0123456789ABCDEF", vec![m(2, 4, "a"), m(10, 14, "b")]);
        assert_eq!(got, vec![m(10, 14, "b"), m(2, 4, "a")]);
    }

    #[test]
    fn coalesce_collapses_identical_spans() {
        let got = coalesce("0123456789", vec![m(2, 5, "a"), m(2, 5, "b")]);
        assert_eq!(got.len(), 1);
        assert_eq!((got[0].start, got[0].end), (2, 5));
    }

    #[test]
    fn coalesce_merges_overlapping_spans() {
        let got = coalesce("0123456789", vec![m(4, 8, "late"), m(2, 6, "early")]);
        assert_eq!(got, vec![m(2, 8, "early")]);
    }

    #[test]
    fn coalesce_merges_contained_spans() {
        let got = coalesce("0123456789", vec![m(1, 9, "outer"), m(3, 4, "inner")]);
        assert_eq!(got, vec![m(1, 9, "outer")]);
    }

    #[test]
    fn coalesce_keeps_touching_spans_apart() {
        let got = coalesce("0123456789", vec![m(2, 4, "a"), m(4, 6, "b")]);
        assert_eq!(got, vec![m(4, 6, "b"), m(2, 4, "a")]);
    }

    #[test]
    fn coalesce_drops_unusable_spans() {
        // "é" occupies bytes 1..3
        let content = "aéb";
        let got = coalesce(
            content,
            vec![m(2, 3, "mid-char"), m(3, 3, "empty"), m(0, 99, "oob"), m(1, 3, "ok")],
        );
        assert_eq!(got, vec![m(1, 3, "ok")]);
    }

    #[test]
    fn character_indices_become_byte_offsets() {
        let content = r#"{"name":"José","token":"ghp_abcdef"}"#;
        // The token is characters 24..34 but bytes 25..35.
        let result = ScanResult {
            policy_break_count: 1,
            policies: vec![],
            policy_breaks: vec![PolicyBreak {
                break_type: "GitHub Token".to_string(),
                policy: "Secrets detection".to_string(),
                matches: vec![RawMatch {
                    index_start: Some(24),
                    index_end: Some(33),
                    ..RawMatch::default()
                }],
            }],
        };
        let matches = flatten(&result, content);
        assert_eq!((matches[0].start, matches[0].end), (25, 35));
        assert_eq!(&content[matches[0].start..matches[0].end], "ghp_abcdef");
    }

    #[test]
    fn char_offsets_cover_end_of_text() {
        let offsets = CharOffsets::new("aéb");
        assert_eq!(offsets.byte_offset(0), Some(0));
        assert_eq!(offsets.byte_offset(2), Some(3));
        assert_eq!(offsets.byte_offset(3), Some(4));
        assert_eq!(offsets.byte_offset(4), None);

        let ascii = CharOffsets::new("abc");
        assert_eq!(ascii.byte_offset(3), Some(3));
        assert_eq!(ascii.byte_offset(4), None);
    }

    #[test]
    fn match_past_document_end_is_dropped() {
        let result = ScanResult {
            policy_break_count: 1,
            policies: vec![],
            policy_breaks: vec![PolicyBreak {
                break_type: "t".to_string(),
                policy: "p".to_string(),
                matches: vec![
                    RawMatch {
                        index_start: Some(usize::MAX - 1),
                        index_end: Some(usize::MAX - 1),
                        ..RawMatch::default()
                    },
                    RawMatch {
                        index_start: Some(1),
                        index_end: Some(2),
                        ..RawMatch::default()
                    },
                ],
            }],
        };
        let matches = flatten(&result, "déjà vu");
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].start, matches[0].end), (1, 4));
    }

    #[test]
    fn shift_overflow_is_none() {
        assert!(m(usize::MAX - 1, usize::MAX, "t").shifted(10).is_none());
        assert_eq!(m(2, 4, "t").shifted(10), Some(m(12, 14, "t")));
    }
}
