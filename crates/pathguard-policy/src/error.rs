//! Policy engine error types.
//!
//! Every failure surfaced by a [`PolicyEngine`](crate::PolicyEngine)
//! implementation is expressed as a [`PolicyError`]. Callers propagate these
//! verbatim; the engine boundary defines no retry semantics.

/// Errors that can occur while loading, reading, or enforcing policies.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// A policy source line could not be parsed.
    #[error("Invalid policy at line {line}: {message}")]
    Parse {
        /// 1-based line number in the policy source.
        line: usize,
        /// Description of why the line is invalid.
        message: String,
    },

    /// Reading a policy file failed.
    #[error("Failed to read policy source: {0}")]
    Io(#[from] std::io::Error),

    /// The policy backend failed to serve the request.
    #[error("Policy backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },
}

impl PolicyError {
    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Type alias for policy engine results.
pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = PolicyError::parse(3, "expected 3 fields after 'p'");
        assert_eq!(
            err.to_string(),
            "Invalid policy at line 3: expected 3 fields after 'p'"
        );
    }

    #[test]
    fn test_backend_error_display() {
        let err = PolicyError::backend("connection reset");
        assert_eq!(err.to_string(), "Policy backend error: connection reset");
    }
}
