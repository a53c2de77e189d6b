use thiserror::Error;

use crate::store::documents::StoreError;

/// Typed failure returned by every service call.
///
/// `Display` is allowed to carry internal detail for logs; anything shown to
/// a caller goes through [`ServiceError::category`] and
/// [`ServiceError::public_message`], which are stable and never leak paths or
/// raw error text.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("target is owned by another user")]
    Ownership,

    #[error("requested item does not exist")]
    NotFound,

    #[error("collection is at its capacity limit")]
    CapacityExceeded,

    #[error("stored document {0} is unreadable")]
    CorruptDocument(String),

    #[error("storage i/o failure")]
    Io(#[source] std::io::Error),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }

    /// Stable machine-readable category, one per variant.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Ownership => "ownership_error",
            Self::NotFound => "not_found",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::CorruptDocument(_) => "corrupt_document",
            Self::Io(_) => "io_error",
            Self::Unauthorized => "unauthorized",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Stable human-readable message safe to return to a caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid input",
            Self::Ownership => "You do not own this resource",
            Self::NotFound => "Not found",
            Self::CapacityExceeded => "Limit reached, delete existing entries first",
            Self::CorruptDocument(_) => "Stored data is unreadable",
            Self::Io(_) => "Storage failure",
            Self::Unauthorized => "Invalid username or password",
            Self::Internal(_) => "Internal error",
        }
    }

    /// Whether the failure is the caller's fault rather than the server's.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Ownership
                | Self::NotFound
                | Self::CapacityExceeded
                | Self::Unauthorized
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { name, .. } => Self::CorruptDocument(name),
            StoreError::Io { source, .. } => Self::Io(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_stable() {
        assert_eq!(ServiceError::validation("x").category(), "validation_error");
        assert_eq!(ServiceError::NotFound.category(), "not_found");
        assert_eq!(ServiceError::CapacityExceeded.category(), "capacity_exceeded");
        assert_eq!(ServiceError::Unauthorized.category(), "unauthorized");
    }

    #[test]
    fn public_message_hides_internal_detail() {
        let err = ServiceError::Validation("height must be positive".into());
        assert_eq!(err.public_message(), "Invalid input");

        let err = ServiceError::CorruptDocument("users.json".into());
        assert!(!err.public_message().contains("users.json"));
    }

    #[test]
    fn client_vs_server_split() {
        assert!(ServiceError::NotFound.is_client_error());
        assert!(ServiceError::Ownership.is_client_error());
        assert!(!ServiceError::Internal("boom".into()).is_client_error());
        assert!(!ServiceError::CorruptDocument("x".into()).is_client_error());
    }
}
