//! Error types for probe checks.
//!
//! Every failure of a single check invocation is expressed as a `ProbeError`.
//! Only `Transport` and `Http` are considered transient; the resolving
//! executor converts the first one of those into a refresh-and-retry.

use crate::topology::Vmid;

/// Failure of a single check invocation.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// A field required for the requested target is missing from the check config.
    #[error("invalid config: missing `{0}`")]
    Config(String),

    /// One of username, realm, token_id or secret is missing.
    #[error("missing credentials")]
    Credential,

    /// The guest is not part of the cluster resource listing.
    #[error("vmid {0} not found in cluster resources")]
    VmidNotFound(Vmid),

    /// Connection-level failure (DNS, TLS handshake, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Success status, but the body is not the expected JSON envelope.
    #[error("invalid response: {0}")]
    Decode(String),

    /// Unknown target kind or check name.
    #[error("unsupported target: {0}")]
    UnsupportedTarget(String),
}

impl ProbeError {
    /// Whether this failure may be caused by a stale node and is worth one retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProbeError::Transport(_) | ProbeError::Http { .. })
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ProbeError::Http {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }
        if err.is_decode() {
            return ProbeError::Decode(err.to_string());
        }
        ProbeError::Transport(err.to_string())
    }
}
