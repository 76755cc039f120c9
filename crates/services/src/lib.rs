#![forbid(unsafe_code)]

pub mod certificate;
pub mod content_store;
pub mod error;
pub mod exam_service;
pub mod feedback;
pub mod progress_service;

pub use coach_core::Clock;

pub use certificate::{CertificateData, CertificateService};
pub use content_store::ContentStore;
pub use error::{CertificateError, ContentStoreError, ExamServiceError, FeedbackError};
pub use exam_service::{ExamKind, ExamService};
pub use feedback::{FeedbackClient, FeedbackConfig, ModuleSummary};
pub use progress_service::ProgressService;
