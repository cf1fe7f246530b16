//! Recovery of structured question records from free-form generation output.
//!
//! The backend is asked for bare JSON objects but routinely wraps them in
//! commentary or markdown fences, concatenates several objects, or stops
//! mid-object. Candidates are found by brace balancing (string literals are
//! skipped so braces inside question text do not count), each candidate is
//! parsed strictly, and anything that fails is dropped.

use serde_json::Value as JsonValue;

use crate::models::question::ParsedRecord;

pub struct OutputParser;

impl OutputParser {
    /// Every well-formed record found in `text`, in order of appearance.
    pub fn extract(text: &str) -> Vec<ParsedRecord> {
        Self::candidates(text)
            .into_iter()
            .filter_map(|candidate| match serde_json::from_str::<JsonValue>(candidate) {
                Ok(value) => ParsedRecord::from_value(&value),
                Err(e) => {
                    tracing::debug!("Dropping malformed candidate ({} bytes): {}", candidate.len(), e);
                    None
                }
            })
            .collect()
    }

    /// Balanced `{...}` substrings, non-overlapping, left to right. An opening
    /// brace that never closes is skipped and the scan resumes right after it,
    /// so complete objects nested inside a truncated one are still found.
    pub fn candidates(text: &str) -> Vec<&str> {
        let bytes = text.as_bytes();
        let mut found = Vec::new();
        let mut pos = 0;

        while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'{') {
            let start = pos + offset;
            match Self::matching_close(bytes, start) {
                Some(end) => {
                    found.push(&text[start..=end]);
                    pos = end + 1;
                }
                None => pos = start + 1,
            }
        }

        found
    }

    fn matching_close(bytes: &[u8], start: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }
}
