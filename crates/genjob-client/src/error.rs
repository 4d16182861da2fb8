//! Error types for the API client.

use thiserror::Error;

/// Failure of a single request against the remote API.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote answered with a non-success status code.
    #[error("HTTP error {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: String,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// A success response carried no payload (empty or `null` body).
    #[error("empty response")]
    Empty,

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    Request(String),

    /// Local I/O failure around the request.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Status code of an HTTP-level failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for HTTP 401.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// True for failures worth another attempt.
    ///
    /// HTTP failures other than 401, empty responses and requests that got no
    /// response at all are retryable. Decode, request-building and local I/O failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status != 401,
            Self::Network(_) | Self::Empty => true,
            Self::Decode(_) | Self::Request(_) | Self::Io(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else if e.is_builder() {
            Self::Request(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Http {
                status: status.as_u16(),
                message: e.to_string(),
                body: String::new(),
            }
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Errors building or configuring the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to construct the underlying HTTP client.
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A request failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> TransportError {
        TransportError::Http {
            status,
            message: "boom".to_string(),
            body: String::new(),
        }
    }

    #[test]
    fn test_unauthorized_is_not_retryable() {
        assert!(http(401).is_unauthorized());
        assert!(!http(401).is_retryable());
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(http(500).is_retryable());
        assert!(http(429).is_retryable());
        assert!(TransportError::Network("reset".into()).is_retryable());
        assert!(TransportError::Empty.is_retryable());
        assert!(TransportError::Empty.status().is_none());
    }

    #[test]
    fn test_local_failures_are_fatal() {
        assert!(!TransportError::Decode("bad json".into()).is_retryable());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!TransportError::from(io).is_retryable());
    }
}
