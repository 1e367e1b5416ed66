//! Error types shared by the store, blob and service layers

use thiserror::Error;

/// Failures raised by a [`crate::db::DocumentStore`] implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A unique key of the collection is already taken
    #[error("Unique key conflict in collection {collection}")]
    Conflict { collection: &'static str },

    /// Store was used before it was initialized
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Failures raised by the filesystem blob store.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Empty file")]
    Empty,

    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("File content does not match an allowed image type")]
    UnsupportedType,

    #[error("Invalid blob key")]
    InvalidKey,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a service operation that did not succeed.
///
/// The first group is the business taxonomy (reported as `ok=false`), the
/// second group wraps infrastructure faults.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not found")]
    NotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("user is not producer")]
    NotProducer,

    #[error("search id already in use")]
    SearchIdInUse,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Rating must be between 1 and 5")]
    InvalidRating,

    #[error("Too many choices selected")]
    TooManyChoices,

    #[error("Question already answered")]
    AlreadyAnswered,

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Blob error: {0}")]
    Blob(#[from] BlobError),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// True for infrastructure faults, false for business declines.
    pub fn is_internal(&self) -> bool {
        match self {
            ServiceError::Store(_)
            | ServiceError::Jwt(_)
            | ServiceError::Hashing(_)
            | ServiceError::Task(_) => true,
            ServiceError::Blob(BlobError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_are_not_internal() {
        assert!(!ServiceError::NotFound.is_internal());
        assert!(!ServiceError::TooManyChoices.is_internal());
        assert!(!ServiceError::Blob(BlobError::UnsupportedType).is_internal());
    }

    #[test]
    fn test_store_errors_are_internal() {
        let err: ServiceError = StoreError::Unavailable("no pool".into()).into();
        assert!(err.is_internal());
    }

    #[test]
    fn test_not_producer_message_matches_reason_string() {
        assert_eq!(ServiceError::NotProducer.to_string(), "user is not producer");
        assert_eq!(
            ServiceError::SearchIdInUse.to_string(),
            "search id already in use"
        );
    }
}
