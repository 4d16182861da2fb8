//! Core domain errors.

use thiserror::Error;

/// Core domain errors for genjob.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A request the remote would refuse.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = CoreError::InvalidInput("prompt must not be empty".into());
        assert_eq!(err.to_string(), "Invalid input: prompt must not be empty");
    }
}
