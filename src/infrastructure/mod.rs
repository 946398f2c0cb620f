pub mod anthropic;
pub mod mock;
pub mod observability;
pub mod openai;
pub mod persistence;
pub mod registry;
pub mod templates;

use crate::domain::errors::ProviderError;
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Fallback when a throttling response carries no usable Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Maps reqwest transport failures onto the provider error taxonomy.
pub(crate) fn map_transport_error(error: reqwest::Error, timeout_ms: u64) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout {
            duration_ms: timeout_ms,
        }
    } else {
        ProviderError::Unknown {
            reason: error.to_string(),
        }
    }
}

pub(crate) fn parse_retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Model replies often wrap the code in a markdown fence, sometimes with a
/// language tag. Returns the inner code, or the trimmed input when no fence
/// is present.
pub(crate) fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the language tag line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}
