use crate::chain::ChainError;

/// Errors surfaced by the lifecycle managers and the reward engine.
///
/// Transient chain failures are retried by the reconciliation poller and never
/// reach callers as permanent failures; everything else is returned
/// synchronously.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflicting in-flight mutation: {0}")]
    Conflict(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("unauthorized operation: {0}")]
    Unauthorized(String),
    #[error("transaction {0} was mined but produced no decodable events")]
    DecodeFailure(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("failed to connect to database: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("corrupted stored value: {0}")]
    Corrupted(String),
}
