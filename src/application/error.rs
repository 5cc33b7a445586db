use thiserror::Error;

use crate::{
    application::{content::ContentError, rating::RatingError, repos::RepoError},
    domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Whether the error means a referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::Domain(error) => error.is_not_found(),
            AppError::Repo(RepoError::NotFound) => true,
            AppError::Rating(error) => error.is_not_found(),
            AppError::Content(error) => error.is_not_found(),
            _ => false,
        }
    }
}
