use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Variants split along the failure policy: `Validation`, `Auth` and
/// `InFlight` are rejected before any local state changes; `Network`,
/// `Conflict` and `NotFound` surface after dispatch and require a full
/// rollback of the optimistic change. Nothing here is fatal and nothing
/// is retried automatically.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Action already in flight: {0}")]
    InFlight(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the error arrived after the optimistic mutation was
    /// applied, meaning the caller must restore its pre-action snapshot.
    pub fn requires_rollback(&self) -> bool {
        matches!(
            self,
            AppError::Network(_) | AppError::Conflict(_) | AppError::NotFound(_)
        )
    }

    /// Stable lowercase tag used in log fields and notices.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Auth(_) => "auth",
            AppError::Network(_) => "network",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::InFlight(_) => "in_flight",
            AppError::Database(_) => "database",
            AppError::SerializationError(_) => "serialization",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
