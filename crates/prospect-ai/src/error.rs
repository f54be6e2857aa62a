use thiserror::Error;

/// Errors produced by one attempt against a chat-completion provider.
#[derive(Debug, Error)]
pub enum AiError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status. The body is kept verbatim
    /// so quota signatures inside it can be classified.
    #[error("provider returned HTTP {status}: {body}")]
    ApiStatus { status: u16, body: String },

    /// The response body could not be deserialized into the expected shape.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The reply parsed but carried no `choices[0].message.content`.
    #[error("model reply from {model} carried no message content")]
    MissingContent { model: String },

    /// The attempt did not settle within the router's per-attempt bound.
    #[error("attempt timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Substrings that mark a provider error as quota or rate-limit exhaustion.
///
/// Matched case-insensitively against the full error message, including any
/// HTTP status number embedded in it.
const QUOTA_SIGNATURES: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "too many requests",
    "429",
    "resource_exhausted",
    "resource exhausted",
    "insufficient_quota",
    "billing",
    "overloaded",
];

/// Returns `true` when `message` looks like quota or rate-limit exhaustion,
/// meaning the (provider, model) pair should cool down rather than be retried.
#[must_use]
pub fn is_quota_signal(message: &str) -> bool {
    let lowered = message.to_lowercase();
    QUOTA_SIGNATURES.iter().any(|sig| lowered.contains(sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_status_is_a_quota_signal() {
        let err = AiError::ApiStatus {
            status: 429,
            body: "slow down".to_string(),
        };
        assert!(is_quota_signal(&err.to_string()));
    }

    #[test]
    fn rate_limit_message_is_a_quota_signal() {
        assert!(is_quota_signal("Rate limit reached for gpt-4o-mini"));
        assert!(is_quota_signal("error code: RESOURCE_EXHAUSTED"));
        assert!(is_quota_signal("insufficient_quota: please add billing"));
    }

    #[test]
    fn plain_server_error_is_not_a_quota_signal() {
        assert!(!is_quota_signal("provider returned HTTP 500: internal error"));
        assert!(!is_quota_signal("connection reset by peer"));
    }
}
