/// Authentication against a single resource provider failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Login to provider '{provider}' failed: {reason}")]
pub struct LoginError {
    pub provider: String,
    pub reason: String,
}

impl LoginError {
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// A write operation could not be persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Persistence failed: {0}")]
    Failed(String),
}
