//! Shared error types for the services crate.

use thiserror::Error;

use coach_core::model::{ContentError, ExamError};
use storage::repository::StorageError;

/// Errors emitted by `ContentStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentStoreError {
    #[error("cannot read content bank '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Errors emitted by `ExamService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamServiceError {
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CertificateService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertificateError {
    #[error("no final exam result stored yet")]
    NoResult,
    #[error("final exam score {score} is below the pass threshold")]
    NotPassed { score: f64 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FeedbackClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedbackError {
    #[error("feedback gateway request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("feedback gateway rejected the request: {0}")]
    Gateway(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
