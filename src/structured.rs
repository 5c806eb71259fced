//! JSON extraction from agent responses.
//!
//! Phase contracts come back as JSON, frequently wrapped in prose or
//! markdown fences. Extraction finds the outermost brace-balanced object,
//! string- and escape-aware, so stray braces inside string values do not
//! truncate the payload.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Appended to the retry message after a parse failure.
pub const JSON_ONLY_REMINDER: &str =
    "Return only a valid JSON object matching the requested schema. No prose, no markdown fences.";

/// Errors extracting or decoding a phase contract.
#[derive(Debug, Error)]
pub enum StructuredError {
    #[error("response contains no JSON object; starts: {prefix}")]
    NoJson { prefix: String },

    #[error("failed to decode {contract}: {source}")]
    Decode {
        contract: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Locate the outermost `{...}` object in free-form text.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip ```json fences when the whole payload is fenced.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. "json") on the fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Decode the typed phase contract out of a raw response.
pub fn decode<T: DeserializeOwned>(
    text: &str,
    contract: &'static str,
) -> Result<T, StructuredError> {
    let unfenced = strip_fences(text);
    let json = extract_json(unfenced).ok_or_else(|| StructuredError::NoJson {
        prefix: text.chars().take(120).collect(),
    })?;
    serde_json::from_str(json).map_err(|source| StructuredError::Decode { contract, source })
}
