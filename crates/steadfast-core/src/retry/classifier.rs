//! Classification of retryable failures.
//!
//! An error is retryable when its name or message contains one of the
//! policy's signatures. Matching is a plain, case-sensitive substring test;
//! stricter matching has to be encoded in the signature list itself.

use super::policy::RetryPolicy;
use crate::error::CallError;

/// Signatures used when the configuration does not override them.
///
/// Covers generic network failures, timeouts, fetch failures, the HTTP
/// statuses that signal temporary unavailability, and upstream proxy errors.
pub const DEFAULT_RETRYABLE_SIGNATURES: &[&str] = &[
    "NetworkError",
    "TimeoutError",
    "timed out",
    "Failed to fetch",
    "fetch failed",
    "429",
    "502",
    "503",
    "504",
    "ECONNRESET",
    "ECONNREFUSED",
    "upstream connect error",
];

/// Determine whether an operation error is worth retrying under `policy`.
pub fn is_retryable(error: &CallError, policy: &RetryPolicy) -> bool {
    matches_signature(error, policy.retryable_signatures())
}

/// True if any signature occurs in the error's name or message.
pub fn matches_signature<S: AsRef<str>>(error: &CallError, signatures: &[S]) -> bool {
    signatures.iter().any(|signature| {
        let signature = signature.as_ref();
        error.name.contains(signature) || error.message.contains(signature)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn test_network_error_is_retryable() {
        assert!(is_retryable(&CallError::network("connection reset"), &policy()));
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(is_retryable(&CallError::timeout("request took too long"), &policy()));
    }

    #[test]
    fn test_rate_limit_is_retryable() {
        assert!(is_retryable(&CallError::http(429, "rate limit exceeded"), &policy()));
    }

    #[test]
    fn test_gateway_errors_are_retryable() {
        for status in [502, 503, 504] {
            assert!(is_retryable(&CallError::http(status, ""), &policy()), "{status}");
        }
    }

    #[test]
    fn test_internal_server_error_not_retryable_by_default() {
        assert!(!is_retryable(&CallError::http(500, "boom"), &policy()));
    }

    #[test]
    fn test_auth_error_not_retryable() {
        assert!(!is_retryable(&CallError::http(401, "unauthorized"), &policy()));
    }

    #[test]
    fn test_parse_error_not_retryable() {
        let err = CallError::new("SyntaxError", "Syntax error: unexpected token");
        assert!(!is_retryable(&err, &policy()));
    }

    #[test]
    fn test_signature_matched_in_message_only() {
        let err = CallError::new("Error", "upstream connect error or disconnect");
        assert!(is_retryable(&err, &policy()));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let err = CallError::new("Error", "networkerror happened");
        assert!(!is_retryable(&err, &policy()));
    }

    #[test]
    fn test_substring_match_is_loose() {
        // Documented behavior: bare status signatures match anywhere in the text
        let err = CallError::new("Error", "processed 429 records");
        assert!(is_retryable(&err, &policy()));
    }

    #[test]
    fn test_custom_signatures_replace_defaults() {
        let policy = RetryPolicy::builder()
            .retryable_signatures(["Busy"])
            .build()
            .unwrap();
        assert!(is_retryable(&CallError::new("Busy", "try later"), &policy));
        assert!(!is_retryable(&CallError::network("down"), &policy));
    }

    #[test]
    fn test_empty_signature_list_retries_nothing() {
        let empty: [&str; 0] = [];
        assert!(!matches_signature(&CallError::network("down"), &empty));
    }
}
