//! Error types for the Underworlds client
//!
//! Provides error handling for:
//! - Nodes or worlds that do not exist
//! - An unreachable authority
//! - Graph operations given ids the cache cannot resolve
//! - Configuration loading

use uwds_proto::{NodeId, RemoteError};

/// Main client error type
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Node, world or id absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport or RPC failure
    #[error("authority unavailable: {0}")]
    Unavailable(String),

    /// Operation not valid for the current graph
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SceneError {
    /// Node missing from a cache
    #[inline]
    #[must_use]
    pub fn node_not_found(id: &NodeId) -> Self {
        Self::NotFound(format!("node {id}"))
    }

    /// Link target missing from a cache
    #[inline]
    #[must_use]
    pub fn unresolved(id: &NodeId) -> Self {
        Self::InvalidState(format!("node {id} does not resolve in this scene"))
    }

    /// Check if the target is absent
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<RemoteError> for SceneError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(what) => Self::NotFound(what),
            RemoteError::Unavailable(why) => Self::Unavailable(why),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for this schema
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_map_to_taxonomy() {
        let err: SceneError = RemoteError::NotFound("node x".to_string()).into();
        assert!(err.is_not_found());

        let err: SceneError = RemoteError::Unavailable("refused".to_string()).into();
        assert!(err.is_retryable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn unresolved_is_invalid_state() {
        let err = SceneError::unresolved(&NodeId::new("ghost"));
        assert!(matches!(err, SceneError::InvalidState(_)));
        assert!(err.to_string().contains("ghost"));
    }
}
