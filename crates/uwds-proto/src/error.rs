//! Errors reported by a remote authority

/// Failure of a remote call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The authority answered, and the target does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The authority could not be reached, or the call failed in transport
    #[error("authority unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Check if the authority confirmed absence
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if a retry may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
