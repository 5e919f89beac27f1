//! Error types shared by the host and the bridge.
//!
//! Only [`IdentityError`] is fatal. Everything else crosses the privilege
//! boundary as a message and is presented by the page.

/// OS account lookup failed. There is no fallback identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Failed to resolve OS account name: {0}")]
    Lookup(String),
}

/// Invalid shell configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid backend URL '{url}': {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("Invalid identity header name '{0}'")]
    InvalidHeaderName(String),
}

/// Failure of a relayed API call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Network failure, non-2xx status or a body that could not be
    /// (de)serialized. Not distinguished further.
    #[error("{0}")]
    Backend(String),

    /// Identity could not be resolved for this call
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The host controller is gone (window torn down, app exiting)
    #[error("Host controller unavailable")]
    HostUnavailable,

    /// The host answered with a reply of the wrong kind
    #[error("Unexpected reply '{0}'")]
    UnexpectedReply(&'static str),
}

/// Failure of a save after the user picked a destination
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("Invalid base64 content: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;
