//! Error types for the podinfo operator.

use thiserror::Error;

/// Errors that can occur during operator operations.
///
/// The client seam classifies every platform failure into one of the
/// variants below. `NotFound` is the only one the reconciler treats as an
/// expected outcome; everything else aborts the current pass.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Resource not found.
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Resource namespace.
        namespace: String,
    },

    /// Optimistic-concurrency rejection: the object changed since it was read.
    #[error("Conflict writing {kind}/{name}: {message}")]
    Conflict {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Message returned by the API server.
        message: String,
    },

    /// Create raced with another writer.
    #[error("Resource already exists: {kind}/{name} in namespace {namespace}")]
    AlreadyExists {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Resource namespace.
        namespace: String,
    },

    /// Network or availability failure talking to the API server.
    #[error("Transient Kubernetes API error: {0}")]
    Transient(String),

    /// The API server rejected the object, or the parent is unusable.
    #[error("Invalid {kind}/{name}: {message}")]
    Invalid {
        /// Resource kind.
        kind: String,
        /// Resource name.
        name: String,
        /// Why the object was rejected.
        message: String,
    },

    /// Invalid operator configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

impl OperatorError {
    /// Classify a `kube::Error` raised while operating on `kind/name`.
    pub fn from_kube(kind: &str, name: &str, namespace: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => match resp.code {
                404 => OperatorError::NotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                },
                409 if resp.reason == "AlreadyExists" => OperatorError::AlreadyExists {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                },
                409 => OperatorError::Conflict {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    message: resp.message,
                },
                400 | 422 => OperatorError::Invalid {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    message: resp.message,
                },
                code => OperatorError::Transient(format!("{} ({}): {}", resp.reason, code, resp.message)),
            },
            other => OperatorError::Transient(other.to_string()),
        }
    }

    /// Whether this error only says the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OperatorError::NotFound { .. })
    }

    /// Whether this error is an optimistic-concurrency rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, OperatorError::Conflict { .. })
    }

    /// Whether re-running the pass later can succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OperatorError::Conflict { .. }
                | OperatorError::AlreadyExists { .. }
                | OperatorError::Transient(_)
        )
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::SerializationError(err.to_string())
    }
}

/// Turn a `NotFound` into success; used for idempotent deletes.
pub fn ignore_not_found(result: OperatorResult<()>) -> OperatorResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
