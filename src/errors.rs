/// All error types that can occur when talking to a bridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// No auth token is present, or the bridge rejected it.
    #[error("bridge {address} rejected authentication: {reason}")]
    Authentication { address: String, reason: String },

    /// Registration was attempted before the bridge's link button was pressed.
    #[error("link button on bridge {address} not pressed; press it and register again")]
    LinkButtonPending { address: String },

    /// The bridge answered with a structured error object.
    #[error("bridge error {error_type} at {address}: {description}")]
    Protocol {
        error_type: u16,
        address: String,
        description: String,
    },

    /// The connection failed before any bridge response arrived.
    #[error("transport {action} error: {detail}")]
    Transport { action: String, detail: String },

    /// The bridge is overloaded or timed out (HTTP 5xx, 408 or 429).
    #[error("bridge busy with status {status}: {body}")]
    ServerBusy { status: u16, body: String },

    /// The bridge answered with a non-retryable HTTP status.
    #[error("unexpected http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// A retryable failure persisted through every attempt.
    #[error("{label} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// The application or device name cannot form a valid device type.
    #[error("invalid device type {0:?}")]
    InvalidDeviceType(String),

    /// Failed to parse a [`crate::Color`] from a string.
    #[error("invalid color string: {0}")]
    InvalidColorString(String),

    /// Attempted to send a [`crate::LightState`] with no attributes set.
    #[error("invalid light state; no attributes set")]
    NoAttribute,

    /// The pool holds no endpoint with this address.
    #[error("no endpoint registered for {0}")]
    EndpointNotFound(String),

    /// A [`crate::BridgeConfig`] failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A broadcast action panicked for one endpoint.
    #[error("action panicked on {address}: {message}")]
    ActionPanicked { address: String, message: String },
}

impl Error {
    /// Create a new transport error
    pub fn transport(action: &str, err: impl std::fmt::Display) -> Self {
        Error::Transport {
            action: action.to_string(),
            detail: err.to_string(),
        }
    }

    /// Create a new authentication error
    pub fn authentication(address: &str, reason: &str) -> Self {
        Error::Authentication {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new protocol error
    pub fn protocol(error_type: u16, address: &str, description: &str) -> Self {
        Error::Protocol {
            error_type,
            address: address.to_string(),
            description: description.to_string(),
        }
    }

    /// Whether a retry of the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        crate::retry::classify(self) == crate::retry::ErrorClass::Retryable
    }

    /// Number of attempts made before this error surfaced.
    pub fn attempts(&self) -> u32 {
        match self {
            Error::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

/// Failures of a cache backend.
///
/// These never reach callers of [`crate::RequestPipeline`]; the cache logs
/// them and the request falls through to the bridge.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io {action} error: {err:?}")]
    Io {
        action: String,
        err: std::io::Error,
    },

    #[error("cache entry encoding error: {0:?}")]
    Serde(serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    pub fn io(action: &str, err: std::io::Error) -> Self {
        CacheError::Io {
            action: action.to_string(),
            err,
        }
    }
}

#[cfg(feature = "cache-redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
