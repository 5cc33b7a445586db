use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain entity `{entity}` with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("domain entity `{entity}` named `{name}` not found")]
    NotFoundNamed { entity: &'static str, name: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn not_found_named(entity: &'static str, name: impl Into<String>) -> Self {
        Self::NotFoundNamed {
            entity,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::NotFound { .. } | DomainError::NotFoundNamed { .. }
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
