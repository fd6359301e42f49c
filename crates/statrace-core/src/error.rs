use thiserror::Error;

/// Application-wide error types for statrace.
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream rejected the request in a way that will not change on retry.
    #[error("permanent HTTP {status} for {url}")]
    PermanentHttp { status: u16, url: String },

    /// The resource does not exist upstream.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// Rate-limit or server-side HTTP failure; eligible for retry.
    #[error("HTTP {status} for {url}")]
    TransientHttp { status: u16, url: String },

    /// Network-level failure (connect, reset, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Retry budget spent without a successful response.
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    /// A selector string failed to parse at extractor construction.
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// Invalid weights, filters, or limits; reported before any work starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller cancelled while suspended.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::TransientHttp { .. } | Error::Network(_) | Error::Timeout(_)
        )
    }

    /// Returns true if this is a fetch outcome that must not be retried.
    pub fn is_permanent_fetch(&self) -> bool {
        matches!(self, Error::PermanentHttp { .. } | Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(
            Error::TransientHttp {
                status: 429,
                url: "u".into()
            }
            .is_transient()
        );
        assert!(
            Error::TransientHttp {
                status: 503,
                url: "u".into()
            }
            .is_transient()
        );
        assert!(Error::Network("reset".into()).is_transient());
        assert!(Error::Timeout(30).is_transient());
        assert!(
            !Error::PermanentHttp {
                status: 403,
                url: "u".into()
            }
            .is_transient()
        );
        assert!(!Error::NotFound { url: "u".into() }.is_transient());
        assert!(!Error::InvalidConfig("bad".into()).is_transient());
    }

    #[test]
    fn permanent_fetch_errors() {
        assert!(
            Error::PermanentHttp {
                status: 403,
                url: "u".into()
            }
            .is_permanent_fetch()
        );
        assert!(Error::NotFound { url: "u".into() }.is_permanent_fetch());
        assert!(
            !Error::TransientHttp {
                status: 500,
                url: "u".into()
            }
            .is_permanent_fetch()
        );
        assert!(!Error::Cancelled.is_permanent_fetch());
    }
}
