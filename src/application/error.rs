use thiserror::Error;

use crate::application::gateway::GatewayError;
use crate::application::storage::StorageError;
use crate::domain::error::DomainError;

/// Error surface of the persistence handlers.
///
/// Handlers perform no local recovery: gateway and storage-engine failures
/// propagate to the caller unmodified, and `NotFound` marks a read that came
/// back empty.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl HandlerError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Domain(DomainError::NotFound { .. })
        )
    }
}
