use thiserror::Error;

/// Classified outcome of a failed HTTP exchange.
///
/// Every network-facing operation reduces its failure to one of these
/// variants so callers can branch on the category instead of raw status
/// codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unauthorized access - please log in")]
    Unauthorized,

    #[error("Resource not found")]
    NotFound,

    #[error("Server error - please try again later")]
    ServerError { status: u16 },

    #[error("Network error - please check your connection")]
    NetworkError(String),

    #[error("{message}")]
    RequestError { status: u16, message: String },
}

impl ApiError {
    /// Classify a non-success HTTP status.
    ///
    /// `server_message` is only used for the catch-all `RequestError`.
    pub fn from_status(status: u16, server_message: Option<String>) -> Self {
        match status {
            401 => ApiError::Unauthorized,
            404 => ApiError::NotFound,
            s if s >= 500 => ApiError::ServerError { status: s },
            s => ApiError::RequestError {
                status: s,
                message: server_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| format!("Request failed with status {}", s)),
            },
        }
    }

    /// Only transport failures and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::NetworkError(_) | ApiError::ServerError { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// HTTP status behind the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::NotFound => Some(404),
            ApiError::ServerError { status } | ApiError::RequestError { status, .. } => {
                Some(*status)
            }
            ApiError::NetworkError(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Entity '{1}' not found in collection '{0}'")]
    EntityNotFound(String, String),

    #[error("Entity '{1}' already exists in collection '{0}'")]
    DuplicateEntity(String, String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Collection '{0}' is registered with a different entity type")]
    TypeMismatch(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// The classified API error, when this failure came from the network.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            SyncError::Api(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl<T> From<std::sync::PoisonError<T>> for SyncError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
