use sling_resolver_api::{LoginError, PersistenceError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ResolverError>;
